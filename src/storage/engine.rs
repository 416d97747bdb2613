//! Trace group engine.
//!
//! Assigns each incoming span to a logical trace group using the
//! parent/child span-id linkage instead of the wire trace id, and merges
//! groups once a link between them becomes known. Spans can arrive in any
//! order relative to their parents, so linking works both ways:
//!
//! - backward: a child whose parent is already resident joins the parent's group;
//! - forward: a parent whose child arrived first joins the child's group,
//!   and a group provisionally built under the parent's id is folded in.
//!
//! A span without an id can only follow a resident parent; it is appended
//! but never deduplicated or indexed, and is dropped if the parent is unknown.
//!
//! The engine is not synchronized; [`crate::storage::TraceStore`] owns it
//! behind a single lock.

use crate::core::{Span, SpanId, TraceGroup, TraceId};
use ahash::{AHashMap, AHashSet};
use lru::LruCache;

/// What happened to a span handed to [`TraceGroupEngine::place`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementOutcome {
    /// Indexed and appended to the group's span list
    Retained,
    /// Indexed, but the group already holds the maximum number of spans
    Truncated,
    /// Span id already recorded in the target group; nothing changed
    Duplicate,
    /// Span without an id whose parent is not resident; nothing changed
    Unplaced,
}

/// Result of placing one span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanPlacement {
    pub group_key: TraceId,
    pub outcome: PlacementOutcome,
    /// Group that was folded into `group_key` as a consequence of this span
    pub merged_from: Option<TraceId>,
    /// Group evicted to make room for a new one
    pub evicted: Option<TraceId>,
}

/// Lifetime counters for the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub spans_retained: u64,
    pub spans_truncated: u64,
    pub duplicates: u64,
    pub spans_unplaced: u64,
    pub groups_created: u64,
    pub groups_evicted: u64,
    pub groups_merged: u64,
}

#[derive(Debug, Default)]
struct GroupState {
    /// Insertion order, capped at `max_spans_per_trace` except on merge
    spans: Vec<Span>,
    /// Every span id ever placed here, uncapped
    seen: AHashSet<SpanId>,
}

/// Touch-ordered trace groups plus the two span-id indices that link them.
pub struct TraceGroupEngine {
    /// Most-recently-touched first
    groups: LruCache<TraceId, GroupState>,
    /// Where a placed span currently lives
    span_to_group: AHashMap<SpanId, TraceId>,
    /// Parent ids that are awaited, mapped to the group their children joined
    parent_to_group: AHashMap<SpanId, TraceId>,
    max_traces: usize,
    max_spans_per_trace: usize,
    stats: EngineStats,
}

impl TraceGroupEngine {
    /// Creates an engine holding at most `max_traces` groups of at most
    /// `max_spans_per_trace` retained spans. Zero limits are raised to one.
    pub fn new(max_traces: usize, max_spans_per_trace: usize) -> Self {
        Self {
            groups: LruCache::unbounded(),
            span_to_group: AHashMap::new(),
            parent_to_group: AHashMap::new(),
            max_traces: max_traces.max(1),
            max_spans_per_trace: max_spans_per_trace.max(1),
            stats: EngineStats::default(),
        }
    }

    /// Places one span, creating, touching, evicting and merging groups as needed.
    pub fn place(&mut self, wire_trace_id: &TraceId, span: Span) -> SpanPlacement {
        if span.span_id.is_unassigned() {
            return self.place_unassigned(wire_trace_id, span);
        }

        let span_id = span.span_id.clone();
        let parent_id = span.parent_span_id.clone();

        let target = self.resolve_target(&span_id, parent_id.as_ref(), wire_trace_id);
        let evicted = self.touch_or_create(&target);

        let group = self.groups.get_or_insert_mut(target.clone(), GroupState::default);
        if !group.seen.insert(span_id.clone()) {
            self.stats.duplicates += 1;
            return SpanPlacement {
                group_key: target,
                outcome: PlacementOutcome::Duplicate,
                merged_from: None,
                evicted,
            };
        }

        let outcome = if group.spans.len() < self.max_spans_per_trace {
            group.spans.push(span);
            self.stats.spans_retained += 1;
            PlacementOutcome::Retained
        } else {
            self.stats.spans_truncated += 1;
            PlacementOutcome::Truncated
        };
        self.span_to_group.insert(span_id.clone(), target.clone());

        if let Some(parent) = parent_id {
            self.parent_to_group
                .entry(parent)
                .or_insert_with(|| target.clone());
        }

        // A child that arrived earlier declared this span as its parent.
        let merged_from = match self.parent_to_group.remove(&span_id) {
            Some(other) if other != target && self.merge_groups(&other, &target) => Some(other),
            _ => None,
        };

        SpanPlacement {
            group_key: target,
            outcome,
            merged_from,
            evicted,
        }
    }

    /// Appends an id-less span to its parent's group, touching the group.
    /// Skips dedup, both indices and the merge check.
    fn place_unassigned(&mut self, wire_trace_id: &TraceId, span: Span) -> SpanPlacement {
        let resident = span
            .parent_span_id
            .as_ref()
            .and_then(|parent| self.span_to_group.get(parent))
            .cloned();
        let group = match resident {
            Some(key) => self.groups.get_mut(&key).map(|group| (key, group)),
            None => None,
        };

        let Some((group_key, group)) = group else {
            self.stats.spans_unplaced += 1;
            tracing::debug!(wire_trace_id = %wire_trace_id, "Dropping span without id: parent not resident");
            return SpanPlacement {
                group_key: wire_trace_id.clone(),
                outcome: PlacementOutcome::Unplaced,
                merged_from: None,
                evicted: None,
            };
        };

        let outcome = if group.spans.len() < self.max_spans_per_trace {
            group.spans.push(span);
            self.stats.spans_retained += 1;
            PlacementOutcome::Retained
        } else {
            self.stats.spans_truncated += 1;
            PlacementOutcome::Truncated
        };

        SpanPlacement {
            group_key,
            outcome,
            merged_from: None,
            evicted: None,
        }
    }

    fn resolve_target(
        &mut self,
        span_id: &SpanId,
        parent_id: Option<&SpanId>,
        wire_trace_id: &TraceId,
    ) -> TraceId {
        if let Some(resident) = parent_id.and_then(|p| self.span_to_group.get(p)) {
            return resident.clone();
        }
        if let Some(awaiting) = self.parent_to_group.remove(span_id) {
            return awaiting;
        }
        wire_trace_id.clone()
    }

    /// Marks `key` most-recently-touched, creating it if absent. Returns the
    /// key of the group evicted to make room, if any.
    fn touch_or_create(&mut self, key: &TraceId) -> Option<TraceId> {
        if self.groups.get_mut(key).is_some() {
            return None;
        }

        let evicted = if self.groups.len() >= self.max_traces {
            self.evict_oldest()
        } else {
            None
        };
        self.groups.put(key.clone(), GroupState::default());
        self.stats.groups_created += 1;
        evicted
    }

    /// Removes the least-recently-touched group and every index entry that
    /// refers to it or to its spans.
    fn evict_oldest(&mut self) -> Option<TraceId> {
        let (key, group) = self.groups.pop_lru()?;

        for id in &group.seen {
            if self.span_to_group.get(id) == Some(&key) {
                self.span_to_group.remove(id);
            }
            self.parent_to_group.remove(id);
        }
        self.parent_to_group.retain(|_, owner| *owner != key);

        self.stats.groups_evicted += 1;
        tracing::debug!(
            group = %key,
            spans = group.spans.len(),
            "Evicted least recently touched trace group"
        );
        Some(key)
    }

    /// Folds `src` into `dst`. Returns false when either group is gone.
    fn merge_groups(&mut self, src: &TraceId, dst: &TraceId) -> bool {
        if src == dst || !self.groups.contains(dst) {
            return false;
        }
        let Some(source) = self.groups.pop(src) else {
            return false;
        };
        let Some(dest) = self.groups.peek_mut(dst) else {
            return false;
        };

        let moved_before = dest.spans.len();
        for span in source.spans {
            // Uncapped: a merge never discards spans already retained.
            if !dest.seen.contains(&span.span_id) {
                dest.spans.push(span);
            }
        }
        let moved = dest.spans.len() - moved_before;

        for id in &source.seen {
            self.span_to_group.insert(id.clone(), dst.clone());
        }
        dest.seen.extend(source.seen);

        for owner in self.parent_to_group.values_mut() {
            if *owner == *src {
                *owner = dst.clone();
            }
        }

        self.stats.groups_merged += 1;
        tracing::debug!(from = %src, into = %dst, moved, "Merged trace groups");
        true
    }

    /// Independent copy of every group, most-recently-touched first.
    pub fn snapshot(&self) -> Vec<TraceGroup> {
        self.groups
            .iter()
            .map(|(key, group)| TraceGroup::new(key.clone(), group.spans.clone()))
            .collect()
    }

    /// Group a placed span currently belongs to.
    pub fn group_of(&self, span_id: &SpanId) -> Option<&TraceId> {
        self.span_to_group.get(span_id)
    }

    /// Group waiting for `parent_id` to arrive, if any.
    pub fn awaiting_parent(&self, parent_id: &SpanId) -> Option<&TraceId> {
        self.parent_to_group.get(parent_id)
    }

    pub fn contains_group(&self, key: &TraceId) -> bool {
        self.groups.contains(key)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn max_traces(&self) -> usize {
        self.max_traces
    }

    pub fn max_spans_per_trace(&self) -> usize {
        self.max_spans_per_trace
    }
}
