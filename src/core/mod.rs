//! Core domain models for spanlink.
//!
//! Error taxonomy, configuration, and the span/trace data model shared by
//! the store, the listener, and the query layer.

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConfigBuilder, LogLevel};
pub use error::{Result, SpanlinkError};
pub use types::{
    Attribute, AttributeValue, Span, SpanBuilder, SpanId, TraceGroup, TraceId, TraceSnapshot,
    TraceSummary,
};
