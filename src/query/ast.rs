//! Parsed query options: targets, attribute patterns, where clauses, time windows.

use std::fmt;
use std::time::Duration;

/// Which trace(s) a query selects from the filtered result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TraceTarget {
    /// Most recently touched trace only
    #[default]
    Last,
    /// Every trace that survives filtering
    Any,
    /// Full 32-hex-character trace id (lowercase)
    Exact(String),
    /// 8-hex-character prefix (lowercase)
    ShortPrefix(String),
}

impl TraceTarget {
    /// Whether a group key is selected by this target
    pub fn selects(&self, group_key: &str) -> bool {
        match self {
            TraceTarget::Last | TraceTarget::Any => true,
            TraceTarget::Exact(id) => group_key.eq_ignore_ascii_case(id),
            TraceTarget::ShortPrefix(prefix) => group_key
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix)),
        }
    }
}

impl fmt::Display for TraceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceTarget::Last => write!(f, "last"),
            TraceTarget::Any => write!(f, "any"),
            TraceTarget::Exact(id) | TraceTarget::ShortPrefix(id) => write!(f, "{}", id),
        }
    }
}

/// `key=value` clause; a trace matches when any span has the exact pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhereClause {
    pub key: String,
    pub value: String,
}

impl fmt::Display for WhereClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Glob-style attribute key pattern. `*` matches any run of characters;
/// a pattern without `*` matches exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePattern {
    raw: String,
    fragments: Vec<String>,
    wildcard: bool,
    anchored_start: bool,
    anchored_end: bool,
}

impl AttributePattern {
    pub fn new<S: Into<String>>(raw: S) -> Self {
        let raw = raw.into();
        let fragments = raw
            .split('*')
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            wildcard: raw.contains('*'),
            anchored_start: !raw.starts_with('*'),
            anchored_end: !raw.ends_with('*'),
            fragments,
            raw,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Fragments must appear in order; the first is a prefix unless the
    /// pattern starts with `*`, the last a suffix unless it ends with `*`.
    pub fn matches(&self, key: &str) -> bool {
        if !self.wildcard {
            return key == self.raw;
        }

        let mut rest = key;
        let last = self.fragments.len().saturating_sub(1);
        for (idx, fragment) in self.fragments.iter().enumerate() {
            if idx == 0 && self.anchored_start {
                match rest.strip_prefix(fragment.as_str()) {
                    Some(remaining) => rest = remaining,
                    None => return false,
                }
            } else if idx == last && self.anchored_end {
                return rest.ends_with(fragment.as_str());
            } else {
                match rest.find(fragment.as_str()) {
                    Some(pos) => rest = &rest[pos + fragment.len()..],
                    None => return false,
                }
            }
        }

        !self.anchored_end || rest.is_empty()
    }
}

impl fmt::Display for AttributePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Unit of a `--since` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowUnit {
    Minutes,
    Hours,
    Days,
}

impl WindowUnit {
    pub fn seconds(&self) -> u64 {
        match self {
            WindowUnit::Minutes => 60,
            WindowUnit::Hours => 60 * 60,
            WindowUnit::Days => 60 * 60 * 24,
        }
    }
}

/// Relative look-back window such as `30m`, `2h` or `1d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinceWindow {
    pub amount: u64,
    pub unit: WindowUnit,
}

impl SinceWindow {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.amount.saturating_mul(self.unit.seconds()))
    }

    /// Earliest span start (unix nanos) that survives the window at `now_ns`.
    pub fn cutoff_ns(&self, now_ns: u64) -> u64 {
        let window_ns = u64::try_from(self.duration().as_nanos()).unwrap_or(u64::MAX);
        now_ns.saturating_sub(window_ns)
    }
}
