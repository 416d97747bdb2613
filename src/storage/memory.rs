//! Bounded in-memory trace store.
//!
//! Wraps the [`TraceGroupEngine`] behind one `parking_lot::Mutex`. Each
//! ingestion batch and each snapshot is a single critical section, so merges
//! are atomic with respect to concurrent requests. No I/O happens under the lock.

use super::engine::{EngineStats, PlacementOutcome, SpanPlacement, TraceGroupEngine};
use crate::core::{Config, Span, TraceGroup, TraceId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Tally of one ingestion batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub retained: usize,
    pub truncated: usize,
    pub duplicates: usize,
    /// Id-less spans whose parent was not resident
    pub unplaced: usize,
    pub merges: usize,
    pub evictions: usize,
}

impl IngestSummary {
    /// Spans that were newly indexed, whether retained or not
    pub fn accepted(&self) -> usize {
        self.retained + self.truncated
    }
}

/// Point-in-time store statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoreStats {
    pub trace_count: usize,
    pub max_traces: usize,
    pub max_spans_per_trace: usize,
    pub batches: u64,
    pub spans_received: u64,
    pub snapshots: u64,
    pub engine: EngineStats,
    pub uptime_secs: f64,
}

/// Holds at most N trace groups of at most M retained spans.
pub struct TraceStore {
    engine: Mutex<TraceGroupEngine>,
    batches: AtomicU64,
    spans_received: AtomicU64,
    snapshots: AtomicU64,
    start_time: Instant,
}

impl TraceStore {
    /// Create a store with the given capacity limits.
    pub fn new(max_traces: usize, max_spans_per_trace: usize) -> Self {
        Self {
            engine: Mutex::new(TraceGroupEngine::new(max_traces, max_spans_per_trace)),
            batches: AtomicU64::new(0),
            spans_received: AtomicU64::new(0),
            snapshots: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Create a store from application configuration.
    pub fn with_config(config: &Config) -> Self {
        Self::new(config.store.max_traces, config.store.max_spans_per_trace)
    }

    /// Places `spans` in order under one wire trace id, atomically.
    pub fn ingest(&self, wire_trace_id: &TraceId, spans: Vec<Span>) -> IngestSummary {
        self.record_batch(spans.len());
        let mut engine = self.engine.lock();
        let mut summary = IngestSummary::default();
        for span in spans {
            let placement = engine.place(wire_trace_id, span);
            tally(&mut summary, &placement);
        }
        summary
    }

    /// Places spans that each carry their own wire trace id, atomically.
    pub fn ingest_spans(&self, spans: Vec<Span>) -> IngestSummary {
        self.record_batch(spans.len());
        let mut engine = self.engine.lock();
        let mut summary = IngestSummary::default();
        for span in spans {
            let wire_trace_id = span.wire_trace_id.clone();
            let placement = engine.place(&wire_trace_id, span);
            tally(&mut summary, &placement);
        }
        summary
    }

    /// Independent copy of all groups, most-recently-touched first.
    pub fn snapshot(&self) -> Vec<TraceGroup> {
        self.snapshots.fetch_add(1, Ordering::Relaxed);
        self.engine.lock().snapshot()
    }

    pub fn len(&self) -> usize {
        self.engine.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.engine.lock().is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        let engine = self.engine.lock();
        StoreStats {
            trace_count: engine.len(),
            max_traces: engine.max_traces(),
            max_spans_per_trace: engine.max_spans_per_trace(),
            batches: self.batches.load(Ordering::Relaxed),
            spans_received: self.spans_received.load(Ordering::Relaxed),
            snapshots: self.snapshots.load(Ordering::Relaxed),
            engine: engine.stats(),
            uptime_secs: self.start_time.elapsed().as_secs_f64(),
        }
    }

    fn record_batch(&self, span_count: usize) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.spans_received.fetch_add(span_count as u64, Ordering::Relaxed);
    }
}

impl Default for TraceStore {
    fn default() -> Self {
        Self::with_config(&Config::default())
    }
}

fn tally(summary: &mut IngestSummary, placement: &SpanPlacement) {
    match placement.outcome {
        PlacementOutcome::Retained => summary.retained += 1,
        PlacementOutcome::Truncated => summary.truncated += 1,
        PlacementOutcome::Duplicate => summary.duplicates += 1,
        PlacementOutcome::Unplaced => summary.unplaced += 1,
    }
    summary.merges += usize::from(placement.merged_from.is_some());
    summary.evictions += usize::from(placement.evicted.is_some());
}
