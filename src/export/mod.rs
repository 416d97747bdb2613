//! Rendering of query results.
//!
//! Three shapes are supported: JSON documents for scripting, a short-id list,
//! and a per-trace tree with one node per span and its attributes beneath.

use crate::core::{Result, Span, TraceGroup};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

/// Output shape for `show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// First trace rendered as a span tree
    Tree,
    /// Short trace ids, one per line
    List,
    /// `{"traces": [...]}`
    Json,
    /// `{"trace_ids": [...]}`
    JsonIds,
}

impl ExportFormat {
    pub fn from_flags(json: bool, list: bool) -> Self {
        match (json, list) {
            (true, true) => ExportFormat::JsonIds,
            (true, false) => ExportFormat::Json,
            (false, true) => ExportFormat::List,
            (false, false) => ExportFormat::Tree,
        }
    }
}

/// Keys kept for inbound/outbound proxy spans in the trimmed view.
const PROXY_SUMMARY_KEYS: &[&str] = &[
    "http.method",
    "http.target",
    "http.status_code",
    "url.scheme",
    "guid:x-request-id",
    "request_size",
    "response_size",
];

/// Shown first, in this order; everything else follows alphabetically.
const PRIORITY_KEYS: &[&str] = &[
    "http.method",
    "http.target",
    "http.status_code",
    "guid:x-request-id",
    "request_size",
    "response_size",
    "routing.determination_ms",
    "route.selected_model",
    "selection.agents",
    "selection.agent_count",
    "agent.name",
    "agent.sequence",
    "duration_ms",
    "llm.model",
    "llm.is_streaming",
    "llm.time_to_first_token",
    "llm.duration_ms",
    "llm.response_bytes",
];

const HIDDEN_KEY: &str = "service.name.override";

#[derive(Serialize)]
struct TracesDocument<'a> {
    traces: &'a [TraceGroup],
}

#[derive(Serialize)]
struct TraceIdsDocument<'a> {
    trace_ids: Vec<&'a str>,
}

/// Render `traces` in `format`. The tree shape shows only the first trace.
pub fn render<W: Write>(traces: &[TraceGroup], format: ExportFormat, verbose: bool, out: &mut W) -> Result<()> {
    match format {
        ExportFormat::Json => render_traces_json(traces, out),
        ExportFormat::JsonIds => render_trace_ids_json(traces, out),
        ExportFormat::List => render_id_list(traces, out),
        ExportFormat::Tree => match traces.first() {
            Some(trace) => render_tree(trace, verbose, out),
            None => {
                writeln!(out, "No traces found.")?;
                Ok(())
            },
        },
    }
}

pub fn render_traces_json<W: Write>(traces: &[TraceGroup], out: &mut W) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, &TracesDocument { traces })?;
    writeln!(out)?;
    Ok(())
}

pub fn render_trace_ids_json<W: Write>(traces: &[TraceGroup], out: &mut W) -> Result<()> {
    let trace_ids = traces.iter().map(|trace| trace.group_key.as_str()).collect();
    serde_json::to_writer_pretty(&mut *out, &TraceIdsDocument { trace_ids })?;
    writeln!(out)?;
    Ok(())
}

pub fn render_id_list<W: Write>(traces: &[TraceGroup], out: &mut W) -> Result<()> {
    if traces.is_empty() {
        writeln!(out, "No trace IDs found.")?;
        return Ok(());
    }

    writeln!(out)?;
    writeln!(out, "Trace IDs:")?;
    for trace in traces {
        writeln!(out, "  - {}", trace.group_key.short())?;
    }
    Ok(())
}

/// Render one trace as a tree of spans ordered by start time.
pub fn render_tree<W: Write>(trace: &TraceGroup, verbose: bool, out: &mut W) -> Result<()> {
    if trace.spans.is_empty() {
        writeln!(out, "No spans found for this trace.")?;
        return Ok(());
    }

    let summary = trace.summary();
    writeln!(out)?;
    writeln!(out, "Trace: {} ({:.0}ms total)", trace.group_key, summary.total_ms())?;
    writeln!(out)?;

    let mut spans: Vec<&Span> = trace.spans.iter().collect();
    spans.sort_by_key(|span| span.start_time_ns);

    let last_span = spans.len() - 1;
    for (idx, span) in spans.iter().enumerate() {
        let (branch, indent) = if idx == last_span {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };

        let offset_ms = span.start_time_ns.saturating_sub(summary.start_ns) as f64 / 1_000_000.0;
        write!(out, "{}{:.0}ms {}", branch, offset_ms, span.service_name)?;
        if !span.name.is_empty() {
            write!(out, " {}", span.name)?;
        }
        writeln!(out)?;

        let attrs = display_attributes(span, verbose);
        let last_attr = attrs.len().saturating_sub(1);
        for (attr_idx, (key, value)) in attrs.iter().enumerate() {
            let leaf = if attr_idx == last_attr { "└── " } else { "├── " };
            writeln!(out, "{}{}{}: {}", indent, leaf, key, flag_value(key, value))?;
        }
    }
    writeln!(out)?;
    Ok(())
}

/// Attributes to show for a span, trimmed and ordered for display.
/// Repeated keys keep the last value.
fn display_attributes(span: &Span, verbose: bool) -> Vec<(&str, String)> {
    let service = span.service_name.to_ascii_lowercase();
    let proxy = service.contains("inbound") || service.contains("outbound");

    let mut attrs: BTreeMap<&str, String> = BTreeMap::new();
    for attr in &span.attributes {
        let key = attr.key.as_str();
        if !verbose && (key == HIDDEN_KEY || (proxy && !PROXY_SUMMARY_KEYS.contains(&key))) {
            continue;
        }
        attrs.insert(key, attr.value.to_display_string());
    }

    let mut ordered = Vec::with_capacity(attrs.len());
    for key in PRIORITY_KEYS {
        if let Some(value) = attrs.remove(key) {
            ordered.push((*key, value));
        }
    }
    ordered.extend(attrs);
    ordered
}

fn flag_value(key: &str, value: &str) -> String {
    if key == "http.status_code" && value != "200" {
        format!("{} ⚠️", value)
    } else {
        value.to_string()
    }
}
