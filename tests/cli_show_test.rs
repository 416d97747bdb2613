//! `show` command path against in-memory snapshots.

use clap::Parser;
use pretty_assertions::assert_eq;
use spanlink_lib::cli::{show_traces, Cli, Command, ShowArgs};
use spanlink_lib::core::TraceGroup;

mod common;
use common::*;

const NOW: u64 = 1_700_000_000_000_000_000;

fn parse_show(argv: &[&str]) -> ShowArgs {
    let cli = Cli::try_parse_from(argv).unwrap();
    match cli.command {
        Some(Command::Show(args)) => args,
        None => cli.show,
        other => panic!("unexpected command: {:?}", other),
    }
}

fn run(argv: &[&str], snapshot: Vec<TraceGroup>) -> spanlink_lib::Result<String> {
    let args = parse_show(argv);
    let options = args.query_options()?;
    let mut out = Vec::new();
    show_traces(&args, &options, snapshot, NOW, &mut out)?;
    Ok(String::from_utf8(out).unwrap())
}

fn snapshot() -> Vec<TraceGroup> {
    vec![
        group(
            "deadbeef00000000000000000000000a",
            vec![
                TestSpanBuilder::new("w1", "root")
                    .service("plano(inbound)")
                    .name("POST /v1/chat")
                    .start_ns(NOW - MINUTE_NS)
                    .duration_ms(40)
                    .attr("http.method", "POST")
                    .attr("http.status_code", "200")
                    .attr("guid:x-request-id", "req-1")
                    .build(),
                TestSpanBuilder::new("w2", "llm")
                    .parent("root")
                    .service("plano(llm)")
                    .name("chat gpt-4o")
                    .start_ns(NOW - MINUTE_NS + 10_000_000)
                    .duration_ms(20)
                    .attr("llm.model", "gpt-4o")
                    .build(),
            ],
        ),
        group(
            "cafebabe00000000000000000000000b",
            vec![TestSpanBuilder::new("w3", "other")
                .start_ns(NOW - 3 * HOUR_NS)
                .attr("http.method", "GET")
                .build()],
        ),
    ]
}

#[test]
fn test_default_shows_latest_trace_tree() {
    let output = run(&["spanlink"], snapshot()).unwrap();
    let expected = "\nTrace: deadbeef00000000000000000000000a (40ms total)\n\n\
        ├── 0ms plano(inbound) POST /v1/chat\n\
        │   ├── http.method: POST\n\
        │   ├── http.status_code: 200\n\
        │   └── guid:x-request-id: req-1\n\
        └── 10ms plano(llm) chat gpt-4o\n    \
            └── llm.model: gpt-4o\n\n";
    assert_eq!(output, expected);
}

#[test]
fn test_list_with_since() {
    let output = run(&["spanlink", "show", "--list", "--since", "1h"], snapshot()).unwrap();
    assert_eq!(output, "\nTrace IDs:\n  - deadbeef\n");
}

#[test]
fn test_json_list_with_limit() {
    let output = run(&["spanlink", "--list", "--json", "--limit", "1"], snapshot()).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(doc, serde_json::json!({"trace_ids": ["deadbeef00000000000000000000000a"]}));
}

#[test]
fn test_json_traces_with_where() {
    let output = run(&["spanlink", "any", "--json", "--where", "http.method=GET"], snapshot()).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&output).unwrap();
    let traces = doc["traces"].as_array().unwrap();
    assert_eq!(traces.len(), 1);
    assert_eq!(traces[0]["trace_id"], "cafebabe00000000000000000000000b");
    assert_eq!(traces[0]["spans"][0]["spanId"], "other");
}

#[test]
fn test_short_target_not_found() {
    let output = run(&["spanlink", "0badf00d"], snapshot()).unwrap();
    assert_eq!(output, "No traces found.\n");
}

#[test]
fn test_empty_snapshot_lists_nothing() {
    let output = run(&["spanlink", "--list"], Vec::new()).unwrap();
    assert_eq!(output, "No trace IDs found.\n");
}

#[test]
fn test_validation_messages() {
    let cases: [(&[&str], &str); 5] = [
        (&["spanlink", "--filter", "a,,b"], "Filter contains empty tokens."),
        (&["spanlink", "--where", "novalue"], "Invalid --where filter(s): novalue. Use key=value."),
        (&["spanlink", "--limit", "-2"], "Limit must be greater than or equal to 0."),
        (&["spanlink", "deadbeef", "--list"], "Target and --list cannot be used together."),
        (&["spanlink", "--where", "missing=1"], "Unknown --where key(s): missing"),
    ];

    for (argv, message) in cases {
        let err = run(argv, snapshot()).unwrap_err();
        assert_eq!(err.to_string(), message, "{:?}", argv);
    }
}
