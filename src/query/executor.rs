//! Query executor: filters a fetched snapshot and selects the target traces.
//!
//! Pure and synchronous. Order of operations:
//! 1. validate where keys and filter patterns against the snapshot's keys
//! 2. time window (spans before the cutoff go; empty traces go)
//! 3. where clauses (AND across clauses, OR across spans)
//! 4. attribute pattern filter
//! 5. target selection, then limit

use super::ast::*;
use crate::core::{Result, Span, SpanlinkError, TraceGroup};
use ahash::AHashSet;

/// Everything a caller can ask of a snapshot.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub target: TraceTarget,
    pub patterns: Vec<AttributePattern>,
    pub where_clauses: Vec<WhereClause>,
    pub since: Option<SinceWindow>,
    pub limit: Option<usize>,
}

/// Filtered traces plus non-fatal notices for the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutcome {
    pub traces: Vec<TraceGroup>,
    pub warnings: Vec<String>,
}

impl QueryOutcome {
    pub fn trace_ids(&self) -> Vec<&str> {
        self.traces.iter().map(|trace| trace.group_key.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }
}

/// Runs `options` against `snapshot` (most-recently-touched first) at `now_ns`.
pub fn execute(snapshot: Vec<TraceGroup>, options: &QueryOptions, now_ns: u64) -> Result<QueryOutcome> {
    let mut warnings = Vec::new();
    let patterns = active_patterns(&snapshot, options, &mut warnings)?;
    let cutoff = options.since.map(|window| window.cutoff_ns(now_ns));

    let mut traces: Vec<TraceGroup> = snapshot
        .into_iter()
        .filter_map(|trace| {
            let trace = apply_window(trace, cutoff)?;
            if !matches_where(&trace, &options.where_clauses) {
                return None;
            }
            apply_patterns(trace, patterns)
        })
        .collect();

    match &options.target {
        TraceTarget::Last => traces.truncate(1),
        TraceTarget::Any => {},
        target => traces.retain(|trace| target.selects(trace.group_key.as_str())),
    }

    if let Some(limit) = options.limit {
        traces.truncate(limit);
    }

    Ok(QueryOutcome { traces, warnings })
}

/// Checks where keys and filter patterns against every key in the snapshot.
/// Returns the patterns to apply; none when no pattern matches anything.
fn active_patterns<'a>(
    snapshot: &[TraceGroup],
    options: &'a QueryOptions,
    warnings: &mut Vec<String>,
) -> Result<&'a [AttributePattern]> {
    if snapshot.is_empty() {
        return Ok(&options.patterns);
    }

    let keys: AHashSet<&str> = snapshot.iter().flat_map(|trace| trace.attribute_keys()).collect();

    let missing: Vec<&str> = options
        .where_clauses
        .iter()
        .map(|clause| clause.key.as_str())
        .filter(|key| !keys.contains(key))
        .collect();
    if !missing.is_empty() {
        return Err(SpanlinkError::query(format!(
            "Unknown --where key(s): {}",
            missing.join(", ")
        )));
    }

    let unmatched: Vec<&str> = options
        .patterns
        .iter()
        .filter(|pattern| !keys.iter().any(|key| pattern.matches(key)))
        .map(AttributePattern::as_str)
        .collect();
    if unmatched.is_empty() {
        return Ok(&options.patterns);
    }

    if unmatched.len() == options.patterns.len() {
        warnings.push(format!(
            "Filter key(s) not found: {}. Returning unfiltered traces.",
            unmatched.join(", ")
        ));
        Ok(&options.patterns[..0])
    } else {
        warnings.push(format!("Filter key(s) not found: {}.", unmatched.join(", ")));
        Ok(&options.patterns)
    }
}

fn apply_window(mut trace: TraceGroup, cutoff: Option<u64>) -> Option<TraceGroup> {
    if let Some(cutoff) = cutoff {
        trace.spans.retain(|span| span.start_time_ns >= cutoff);
    }
    if trace.spans.is_empty() {
        None
    } else {
        Some(trace)
    }
}

fn matches_where(trace: &TraceGroup, clauses: &[WhereClause]) -> bool {
    clauses.iter().all(|clause| {
        trace
            .spans
            .iter()
            .any(|span| span.has_attribute_value(&clause.key, &clause.value))
    })
}

/// Keeps only matching attribute keys. A trace where no span keeps a single
/// attribute is dropped; otherwise every span stays, possibly bare.
fn apply_patterns(mut trace: TraceGroup, patterns: &[AttributePattern]) -> Option<TraceGroup> {
    if patterns.is_empty() {
        return Some(trace);
    }

    let mut kept_any = false;
    for span in &mut trace.spans {
        retain_matching(span, patterns);
        kept_any |= !span.attributes.is_empty();
    }

    kept_any.then_some(trace)
}

fn retain_matching(span: &mut Span, patterns: &[AttributePattern]) {
    span.attributes
        .retain(|attr| patterns.iter().any(|pattern| pattern.matches(&attr.key)));
}
