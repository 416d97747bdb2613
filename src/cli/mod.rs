//! Command-line interface for spanlink.
//!
//! `spanlink listen` runs the trace listener in the foreground.
//! `spanlink [show] [TARGET]` fetches the listener's snapshot and renders it.

use crate::client::TraceQueryClient;
use crate::core::types::now_unix_nanos;
use crate::core::{Config, Result, SpanlinkError, TraceGroup};
use crate::export::{render, ExportFormat};
use crate::query::{self, QueryOptions};
use crate::receiver::{is_port_bound, start_listener};
use crate::storage::TraceStore;
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Live trace aggregation for OpenTelemetry spans.
#[derive(Parser, Debug)]
#[command(name = "spanlink")]
#[command(version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Configuration file path (default: ~/.config/spanlink/config.yaml)
    #[arg(short, long, env = "SPANLINK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, env = "SPANLINK_DEBUG", global = true)]
    pub debug: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub check_config: bool,

    #[command(subcommand)]
    pub command: Option<Command>,

    /// `show` arguments when no subcommand is named
    #[command(flatten)]
    pub show: ShowArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the OTLP trace listener until interrupted
    Listen(ListenArgs),
    /// Show traces held by a running listener
    Show(ShowArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListenArgs {
    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// OTLP gRPC port
    #[arg(long, env = "SPANLINK_TRACE_PORT")]
    pub port: Option<u16>,

    /// Do not echo accepted spans
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ShowArgs {
    /// `last`, `any`, a 32-hex trace id or an 8-hex short id
    pub target: Option<String>,

    /// Limit displayed attributes to matching keys (wildcards supported). Repeatable.
    #[arg(long = "filter", value_name = "PATTERN")]
    pub filters: Vec<String>,

    /// Match traces that contain key=value. Repeatable (AND semantics).
    #[arg(long = "where", value_name = "KEY=VALUE")]
    pub where_filters: Vec<String>,

    /// List trace IDs only
    #[arg(long)]
    pub list: bool,

    /// Disable interactive prompts and selections
    #[arg(long)]
    pub no_interactive: bool,

    /// Limit results
    #[arg(long, allow_negative_numbers = true)]
    pub limit: Option<i64>,

    /// Look back window (e.g. 5m, 2h, 1d)
    #[arg(long)]
    pub since: Option<String>,

    /// Output raw JSON
    #[arg(long)]
    pub json: bool,

    /// Show all span attributes; default trims inbound/outbound to a few keys
    #[arg(short, long)]
    pub verbose: bool,

    /// Listener host to query
    #[arg(long)]
    pub host: Option<String>,

    /// Listener port to query
    #[arg(long, env = "SPANLINK_TRACE_PORT")]
    pub port: Option<u16>,
}

impl ShowArgs {
    /// Validate every option before anything is fetched.
    pub fn query_options(&self) -> Result<QueryOptions> {
        let patterns = query::parse_filter_patterns(&self.filters)?;
        let where_clauses = query::parse_where_clauses(&self.where_filters)?;

        let limit = match self.limit {
            Some(limit) if limit < 0 => {
                return Err(SpanlinkError::query("Limit must be greater than or equal to 0."));
            },
            Some(limit) => Some(usize::try_from(limit).unwrap_or(usize::MAX)),
            None => None,
        };

        let since = self.since.as_deref().and_then(query::parse_since);
        let target = query::resolve_target(
            self.target.as_deref(),
            self.list,
            self.since.is_some(),
            self.limit.is_some(),
        )?;

        Ok(QueryOptions {
            target,
            patterns,
            where_clauses,
            since,
            limit,
        })
    }

    pub fn format(&self) -> ExportFormat {
        ExportFormat::from_flags(self.json, self.list)
    }
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration with precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables
    /// 3. Config file
    /// 4. Defaults (lowest priority)
    ///
    /// Per-command host/port overrides are applied when the command runs.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            // An explicitly named file must be readable
            Some(path) => Config::from_file(path)?,
            None => match Config::default_path().filter(|path| path.exists()) {
                Some(path) => Config::from_file(&path)?,
                None => Config::new()?,
            },
        };
        config.debug = self.debug;
        Ok(config)
    }

    /// Initialize logging based on configuration.
    pub fn init_logging(&self, config: &Config) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let env_log_level = std::env::var("SPANLINK_LOG_LEVEL").ok();
        let log_level = if self.debug {
            "debug"
        } else {
            env_log_level.as_deref().unwrap_or_else(|| config.effective_log_level().as_str())
        };

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let fmt_layer = if self.is_listen() {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .compact()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact()
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| SpanlinkError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }

    fn is_listen(&self) -> bool {
        matches!(self.command, Some(Command::Listen(_)))
    }
}

/// Execute the parsed command against a loaded configuration.
pub async fn execute(cli: Cli, config: Config) -> Result<()> {
    if cli.check_config {
        config.validate()?;
        println!("Configuration is valid!");
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command {
        Some(Command::Listen(args)) => listen(&args, &config).await,
        Some(Command::Show(args)) => show(&args, &config).await,
        None => show(&cli.show, &config).await,
    }
}

async fn listen(args: &ListenArgs, config: &Config) -> Result<()> {
    let host = args.host.as_deref().unwrap_or(&config.server.host);
    let port = args.port.unwrap_or(config.server.port);

    if port != 0 && is_port_bound(port) {
        return Err(SpanlinkError::Bind {
            addr: SocketAddr::from(([127, 0, 0, 1], port)),
            source: std::io::ErrorKind::AddrInUse.into(),
        });
    }

    let store = Arc::new(TraceStore::with_config(config));
    let echo = config.server.echo_spans && !args.quiet;
    let handle = start_listener(host, port, Arc::clone(&store), echo).await?;

    tracing::info!(
        addr = %handle.local_addr(),
        max_traces = config.store.max_traces,
        max_spans_per_trace = config.store.max_spans_per_trace,
        "spanlink listening; press Ctrl-C to stop"
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
    };
    handle.run_until(shutdown, config.server.shutdown_grace).await?;

    let stats = store.stats();
    tracing::info!(
        traces = stats.trace_count,
        spans_received = stats.spans_received,
        uptime_secs = stats.uptime_secs,
        "Listener stopped"
    );
    Ok(())
}

async fn show(args: &ShowArgs, config: &Config) -> Result<()> {
    let options = args.query_options()?;

    let host = args.host.clone().unwrap_or_else(|| config.client.host.clone());
    let port = args.port.unwrap_or(config.server.port);
    let snapshot = TraceQueryClient::new(host, port, config.client.timeout)
        .fetch_traces()
        .await;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    show_traces(args, &options, snapshot, now_unix_nanos(), &mut out)
}

/// Filters `snapshot` and renders the result. Warnings go to stderr.
pub fn show_traces<W: Write>(
    args: &ShowArgs,
    options: &QueryOptions,
    snapshot: Vec<TraceGroup>,
    now_ns: u64,
    out: &mut W,
) -> Result<()> {
    let outcome = query::execute(snapshot, options, now_ns)?;
    for warning in &outcome.warnings {
        eprintln!("Warning: {}", warning);
    }
    render(&outcome.traces, args.format(), args.verbose, out)
}
