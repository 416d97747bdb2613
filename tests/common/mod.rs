//! Common test utilities and fixtures.

#![allow(dead_code)]

use opentelemetry_proto::tonic::{
    collector::trace::v1::ExportTraceServiceRequest,
    common::v1::{any_value::Value, AnyValue, KeyValue},
    resource::v1::Resource,
    trace::v1::{ResourceSpans, ScopeSpans, Span as OtelSpan},
};
use spanlink_lib::core::{Span, TraceGroup, TraceId};

pub const MINUTE_NS: u64 = 60_000_000_000;
pub const HOUR_NS: u64 = 60 * MINUTE_NS;

/// Test fixture builder for creating spans with sensible defaults.
pub struct TestSpanBuilder {
    wire_trace_id: String,
    span_id: String,
    parent_span_id: String,
    service: String,
    name: String,
    start_ns: u64,
    duration_ms: u64,
    attributes: Vec<(String, String)>,
}

impl TestSpanBuilder {
    pub fn new(wire_trace_id: &str, span_id: &str) -> Self {
        Self {
            wire_trace_id: wire_trace_id.to_string(),
            span_id: span_id.to_string(),
            parent_span_id: String::new(),
            service: "test-service".to_string(),
            name: "test-operation".to_string(),
            start_ns: 1_700_000_000_000_000_000,
            duration_ms: 100,
            attributes: Vec::new(),
        }
    }

    pub fn parent(mut self, parent_span_id: &str) -> Self {
        self.parent_span_id = parent_span_id.to_string();
        self
    }

    pub fn service(mut self, service: &str) -> Self {
        self.service = service.to_string();
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn start_ns(mut self, start_ns: u64) -> Self {
        self.start_ns = start_ns;
        self
    }

    pub fn duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = ms;
        self
    }

    pub fn attr(mut self, key: &str, value: &str) -> Self {
        self.attributes.push((key.to_string(), value.to_string()));
        self
    }

    pub fn build(self) -> Span {
        let mut builder = Span::builder()
            .trace_id(self.wire_trace_id)
            .span_id(self.span_id)
            .parent_span_id(self.parent_span_id)
            .service_name(self.service)
            .name(self.name)
            .start_time_ns(self.start_ns)
            .end_time_ns(self.start_ns + self.duration_ms * 1_000_000);
        for (key, value) in self.attributes {
            builder = builder.attribute(key, value);
        }
        builder.build().unwrap()
    }
}

pub fn trace_id(id: &str) -> TraceId {
    TraceId::new(id).unwrap()
}

pub fn group(key: &str, spans: Vec<Span>) -> TraceGroup {
    TraceGroup::new(trace_id(key), spans)
}

/// Span ids of a group, in retained order.
pub fn span_ids(group: &TraceGroup) -> Vec<&str> {
    group.spans.iter().map(|span| span.span_id.as_str()).collect()
}

pub fn string_kv(key: &str, value: &str) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue {
            value: Some(Value::StringValue(value.to_string())),
        }),
    }
}

/// OTLP span with raw byte ids.
pub fn otlp_span(trace_id: [u8; 16], span_id: [u8; 8], parent: Option<[u8; 8]>, name: &str) -> OtelSpan {
    let start = 1_700_000_000_000_000_000;
    OtelSpan {
        trace_id: trace_id.to_vec(),
        span_id: span_id.to_vec(),
        parent_span_id: parent.map(|p| p.to_vec()).unwrap_or_default(),
        name: name.to_string(),
        start_time_unix_nano: start,
        end_time_unix_nano: start + 1_500_000_000,
        attributes: vec![string_kv("http.method", "GET")],
        ..Default::default()
    }
}

/// One resource with one scope carrying `spans`.
pub fn export_request(service: &str, spans: Vec<OtelSpan>) -> ExportTraceServiceRequest {
    ExportTraceServiceRequest {
        resource_spans: vec![ResourceSpans {
            resource: Some(Resource {
                attributes: vec![string_kv("service.name", service)],
                ..Default::default()
            }),
            scope_spans: vec![ScopeSpans {
                spans,
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
