//! Storage for live trace data.
//!
//! `engine` holds the grouping and merge algorithm, `memory` the bounded,
//! lock-guarded store the listener writes to and the query endpoint reads.

pub mod engine;
pub mod memory;

// Re-export commonly used types
pub use engine::{EngineStats, PlacementOutcome, SpanPlacement, TraceGroupEngine};
pub use memory::{IngestSummary, StoreStats, TraceStore};
