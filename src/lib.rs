//! spanlink - live OTLP trace aggregation.
//!
//! spanlink receives OpenTelemetry spans over OTLP/gRPC and joins them into
//! logical traces by parent/child span linkage, even when the spans of one
//! request arrive under different wire trace ids. A bounded, touch-ordered
//! window of recent traces is kept in memory and served as a JSON snapshot.
//!
//! # Architecture
//!
//! - `core`: error taxonomy, configuration, span/trace model
//! - `storage`: grouping engine and bounded trace store
//! - `receiver`: OTLP ingestion, query endpoint, listener lifecycle
//! - `client`: snapshot client for a running listener
//! - `query`: client-side filtering and target selection
//! - `export`: JSON, id list and tree rendering
//! - `cli`: command-line interface
//!
//! # Example
//!
//! ```no_run
//! use spanlink_lib::receiver::start_listener;
//! use spanlink_lib::storage::TraceStore;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> spanlink_lib::Result<()> {
//!     let store = Arc::new(TraceStore::new(50, 500));
//!     let handle = start_listener("127.0.0.1", 4317, Arc::clone(&store), true).await?;
//!     tokio::signal::ctrl_c().await?;
//!     handle.stop(Duration::from_secs(2)).await
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cli;
pub mod client;
pub mod core;
pub mod export;
pub mod query;
pub mod receiver;
pub mod storage;

// Re-export core types for convenience
pub use crate::core::{Config, Result, SpanlinkError};
