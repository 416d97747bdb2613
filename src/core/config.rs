//! Configuration management for spanlink.
//!
//! Settings come from a YAML file with defaults for every section,
//! then environment and CLI overrides applied by the front end.

use crate::core::{Result, SpanlinkError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default OTLP/gRPC port.
pub const DEFAULT_GRPC_PORT: u16 = 4317;
/// Default number of trace groups kept in memory.
pub const DEFAULT_MAX_TRACES: usize = 50;
/// Default number of spans retained per trace group.
pub const DEFAULT_MAX_SPANS_PER_TRACE: usize = 500;

/// Complete configuration for spanlink
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listener configuration
    pub server: ServerConfig,
    /// Trace store limits
    pub store: StoreConfig,
    /// Query client configuration
    pub client: ClientConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for the listener
    pub host: String,
    /// GRPC port serving both ingestion and query
    pub port: u16,
    /// Runtime worker threads
    pub worker_threads: usize,
    /// How long in-flight requests get to finish on shutdown
    #[serde(with = "humantime_serde")]
    pub shutdown_grace: Duration,
    /// Echo one line per accepted span
    pub echo_spans: bool,
}

/// Trace store limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub max_traces: usize,
    pub max_spans_per_trace: usize,
}

/// Query client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Host the listener is reached on
    pub host: String,
    /// Connect + request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_GRPC_PORT,
            worker_threads: 4,
            shutdown_grace: Duration::from_secs(2),
            echo_spans: true,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            max_traces: DEFAULT_MAX_TRACES,
            max_spans_per_trace: DEFAULT_MAX_SPANS_PER_TRACE,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: "127.0.0.1".to_string(),
            timeout: Duration::from_secs(3),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SpanlinkError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        ConfigBuilder::new().from_yaml(&contents)?.build()
    }

    /// `<config dir>/spanlink/config.yaml`, when the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("spanlink").join("config.yaml"))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(SpanlinkError::config("server.host must not be empty"));
        }

        if self.server.worker_threads == 0 {
            return Err(SpanlinkError::config("server.worker_threads must be greater than 0"));
        }

        if self.store.max_traces == 0 {
            return Err(SpanlinkError::config("store.max_traces must be greater than 0"));
        }

        if self.store.max_spans_per_trace == 0 {
            return Err(SpanlinkError::config("store.max_spans_per_trace must be greater than 0"));
        }

        if self.client.host.trim().is_empty() {
            return Err(SpanlinkError::config("client.host must not be empty"));
        }

        if self.client.timeout.is_zero() {
            return Err(SpanlinkError::config("client.timeout must be greater than 0"));
        }

        Ok(())
    }

    /// Effective level after the debug flag
    pub fn effective_log_level(&self) -> LogLevel {
        if self.debug {
            LogLevel::Debug
        } else {
            self.logging.level
        }
    }

    /// Render the effective settings as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| SpanlinkError::config(format!("Failed to render config: {}", e)))
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = SpanlinkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(SpanlinkError::config(format!("Unknown log level: {}", other))),
        }
    }
}

/// Configuration builder for programmatic construction
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: Config) -> Self {
        ConfigBuilder { config }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        // An empty document means "all defaults"
        if yaml.trim().is_empty() {
            return Ok(self);
        }
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| SpanlinkError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Set listener host
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.server.host = host.into();
        self
    }

    /// Set listener port
    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    /// Set max trace groups
    pub fn max_traces(mut self, count: usize) -> Self {
        self.config.store.max_traces = count;
        self
    }

    /// Set max spans per trace group
    pub fn max_spans_per_trace(mut self, count: usize) -> Self {
        self.config.store.max_spans_per_trace = count;
        self
    }

    /// Enable or disable the span echo
    pub fn echo_spans(mut self, echo: bool) -> Self {
        self.config.server.echo_spans = echo;
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 4317);
        assert_eq!(config.store.max_traces, 50);
        assert_eq!(config.store.max_spans_per_trace, 500);
        assert_eq!(config.client.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = Config::default();
        config.store.max_traces = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.store.max_spans_per_trace = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.worker_threads = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_host_rejected() {
        let result = ConfigBuilder::new().host("  ").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .host("127.0.0.1")
            .port(9090)
            .max_traces(10)
            .max_spans_per_trace(20)
            .echo_spans(false)
            .debug(true)
            .build()
            .unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.store.max_traces, 10);
        assert_eq!(config.store.max_spans_per_trace, 20);
        assert!(!config.server.echo_spans);
        assert_eq!(config.effective_log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
server:
  port: 5317
  shutdown_grace: 500ms
store:
  max_traces: 5
client:
  timeout: 1s
logging:
  level: warn
"#;

        let config = ConfigBuilder::new().from_yaml(yaml).unwrap().build().unwrap();

        assert_eq!(config.server.port, 5317);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.shutdown_grace, Duration::from_millis(500));
        assert_eq!(config.store.max_traces, 5);
        assert_eq!(config.store.max_spans_per_trace, 500);
        assert_eq!(config.client.timeout, Duration::from_secs(1));
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn test_empty_yaml_is_defaults() {
        let config = ConfigBuilder::new().from_yaml("\n").unwrap().build().unwrap();
        assert_eq!(config.server.port, DEFAULT_GRPC_PORT);
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(ConfigBuilder::new().from_yaml("store: [oops").is_err());
    }

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
