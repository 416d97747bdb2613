//! Filter/query layer over snapshots.

use pretty_assertions::assert_eq;
use spanlink_lib::query::{
    execute, parse_filter_patterns, parse_since, parse_where_clauses, resolve_target, QueryOptions, TraceTarget,
};

use spanlink_lib::core::Span;

mod common;
use common::*;

const NOW: u64 = 1_700_000_000_000_000_000;

#[test]
fn test_where_requires_every_clause() {
    let snapshot = vec![
        group(
            "11111111aaaaaaaaaaaaaaaaaaaaaaaa",
            vec![TestSpanBuilder::new("w1", "a").start_ns(NOW).attr("k1", "v1").build()],
        ),
        group(
            "22222222bbbbbbbbbbbbbbbbbbbbbbbb",
            vec![
                TestSpanBuilder::new("w2", "b").start_ns(NOW).attr("k1", "v1").build(),
                TestSpanBuilder::new("w2", "c").start_ns(NOW).attr("k2", "v2").build(),
            ],
        ),
    ];

    let options = QueryOptions {
        target: TraceTarget::Any,
        where_clauses: parse_where_clauses(&["k1=v1", "k2=v2"]).unwrap(),
        ..Default::default()
    };
    let outcome = execute(snapshot, &options, NOW).unwrap();
    assert_eq!(outcome.trace_ids(), vec!["22222222bbbbbbbbbbbbbbbbbbbbbbbb"]);
}

#[test]
fn test_where_matches_typed_values_by_display_form() {
    let typed = |id: &str, streaming: bool, ratio: f64| {
        Span::builder()
            .trace_id("w1")
            .span_id(id)
            .start_time_ns(NOW)
            .attribute("llm.is_streaming", streaming)
            .attribute("cache.ratio", ratio)
            .build()
            .unwrap()
    };
    let snapshot = vec![
        group("11111111aaaaaaaaaaaaaaaaaaaaaaaa", vec![typed("a", true, 1.0)]),
        group("22222222bbbbbbbbbbbbbbbbbbbbbbbb", vec![typed("b", false, 0.5)]),
    ];
    let run = |clauses: &[&str]| {
        let options = QueryOptions {
            target: TraceTarget::Any,
            where_clauses: parse_where_clauses(clauses).unwrap(),
            ..Default::default()
        };
        execute(snapshot.clone(), &options, NOW).unwrap().trace_ids().join(",")
    };

    assert_eq!(run(&["llm.is_streaming=True"]), "11111111aaaaaaaaaaaaaaaaaaaaaaaa");
    assert_eq!(run(&["llm.is_streaming=False"]), "22222222bbbbbbbbbbbbbbbbbbbbbbbb");
    assert_eq!(run(&["llm.is_streaming=true"]), "");
    assert_eq!(run(&["cache.ratio=1.0"]), "11111111aaaaaaaaaaaaaaaaaaaaaaaa");
    assert_eq!(run(&["cache.ratio=1"]), "");
}

#[test]
fn test_since_window_keeps_recent_traces() {
    let snapshot = vec![
        group(
            "11111111aaaaaaaaaaaaaaaaaaaaaaaa",
            vec![TestSpanBuilder::new("w1", "old").start_ns(NOW - 2 * HOUR_NS).build()],
        ),
        group(
            "22222222bbbbbbbbbbbbbbbbbbbbbbbb",
            vec![TestSpanBuilder::new("w2", "new").start_ns(NOW - 30 * MINUTE_NS).build()],
        ),
    ];

    let since = parse_since("1h");
    let options = QueryOptions {
        target: resolve_target(None, false, since.is_some(), false).unwrap(),
        since,
        ..Default::default()
    };
    let outcome = execute(snapshot, &options, NOW).unwrap();
    assert_eq!(outcome.trace_ids(), vec!["22222222bbbbbbbbbbbbbbbbbbbbbbbb"]);
}

#[test]
fn test_unparsable_window_is_ignored() {
    let snapshot = vec![group(
        "11111111aaaaaaaaaaaaaaaaaaaaaaaa",
        vec![TestSpanBuilder::new("w1", "old").start_ns(NOW - 48 * HOUR_NS).build()],
    )];

    let options = QueryOptions {
        target: TraceTarget::Any,
        since: parse_since("yesterday"),
        ..Default::default()
    };
    assert_eq!(execute(snapshot, &options, NOW).unwrap().traces.len(), 1);
}

#[test]
fn test_target_resolution() {
    let rejected = [
        "00000000",
        "00000000000000000000000000000000",
        "xyzxyzxy",
        "0af7651916cd43dd8448eb211c80319",
        "0af7651916cd43dd8448eb211c80319cc",
        "0af765",
    ];
    for token in rejected {
        assert!(resolve_target(Some(token), false, false, false).is_err(), "{token}");
    }

    assert_eq!(
        resolve_target(Some("DEADBEEF"), false, false, false).unwrap(),
        TraceTarget::ShortPrefix("deadbeef".to_string())
    );
    assert_eq!(
        resolve_target(Some("0af7651916cd43dd8448eb211c80319c"), false, false, false).unwrap(),
        TraceTarget::Exact("0af7651916cd43dd8448eb211c80319c".to_string())
    );
}

#[test]
fn test_short_target_and_filter_together() {
    let snapshot = vec![
        group(
            "deadbeef00000000000000000000000a",
            vec![TestSpanBuilder::new("w1", "a")
                .start_ns(NOW)
                .attr("llm.model", "gpt-4o")
                .attr("http.method", "POST")
                .build()],
        ),
        group(
            "cafebabe00000000000000000000000b",
            vec![TestSpanBuilder::new("w2", "b").start_ns(NOW).attr("llm.model", "claude").build()],
        ),
    ];

    let options = QueryOptions {
        target: resolve_target(Some("deadbeef"), false, false, false).unwrap(),
        patterns: parse_filter_patterns(&["llm.*"]).unwrap(),
        ..Default::default()
    };
    let outcome = execute(snapshot, &options, NOW).unwrap();

    assert_eq!(outcome.trace_ids(), vec!["deadbeef00000000000000000000000a"]);
    let keys: Vec<&str> = outcome.traces[0].attribute_keys().collect();
    assert_eq!(keys, vec!["llm.model"]);
}

#[test]
fn test_validation_errors_before_filtering() {
    assert!(parse_filter_patterns(&["a,"]).is_err());
    assert!(parse_where_clauses(&["=value"]).is_err());
    assert!(resolve_target(Some("deadbeef"), true, false, false).is_err());

    let snapshot = vec![group(
        "11111111aaaaaaaaaaaaaaaaaaaaaaaa",
        vec![TestSpanBuilder::new("w1", "a").attr("k1", "v1").build()],
    )];
    let options = QueryOptions {
        where_clauses: parse_where_clauses(&["typo=v1"]).unwrap(),
        ..Default::default()
    };
    let err = execute(snapshot, &options, NOW).unwrap_err();
    assert_eq!(err.to_string(), "Unknown --where key(s): typo");
}
