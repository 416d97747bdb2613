use std::net::SocketAddr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpanlinkError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid span data: {0}")]
    InvalidSpan(String),

    /// Caller-facing query validation failure. The message is shown verbatim.
    #[error("{0}")]
    Query(String),

    #[error(
        "Cannot bind trace listener to {addr}: {source}. Port {port} is probably already in use; \
         find the process holding it (e.g. `lsof -i :{port}`) and stop it, or run \
         `spanlink listen --port <PORT>` on a free port",
        port = .addr.port()
    )]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("GRPC error: {0}")]
    Grpc(#[from] tonic::Status),

    #[error("GRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("Async task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// The trace listener could not be reached.
    #[error("Network error: {0}")]
    Network(String),
}

/// Result type alias for spanlink operations
pub type Result<T> = std::result::Result<T, SpanlinkError>;

impl SpanlinkError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new query validation error
    pub fn query<S: Into<String>>(msg: S) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a new network error
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::InvalidSpan(_) | Self::Query(_) => "validation",
            Self::Bind { .. } => "bind",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Grpc(_) | Self::Transport(_) | Self::Network(_) => "network",
            Self::Join(_) => "async",
        }
    }
}
