//! OpenTelemetry receiver implementation.
//!
//! Accepts OTLP/gRPC `TraceService/Export` batches, normalizes each span and
//! feeds the batch to the shared [`TraceStore`] under one lock acquisition.
//! The query endpoint and listener lifecycle live in the submodules.

pub mod codec;
pub mod listener;
pub mod query;

pub use listener::{is_port_bound, start_listener, ListenerHandle};
pub use query::{TraceQueryServer, GET_TRACES_PATH};

use crate::core::{Attribute, AttributeValue, Result, Span, SpanId, SpanlinkError, TraceId};
use crate::storage::TraceStore;
use opentelemetry_proto::tonic::collector::trace::v1::{
    trace_service_server::{TraceService, TraceServiceServer},
    ExportTraceServiceRequest, ExportTraceServiceResponse,
};
use opentelemetry_proto::tonic::common::v1::{any_value, AnyValue, KeyValue};
use opentelemetry_semantic_conventions::resource::SERVICE_NAME;
use std::sync::Arc;
use tonic::{Request, Response, Status};

/// Tracing target of the per-span console echo.
pub const SPAN_ECHO_TARGET: &str = "spanlink::spans";

/// OTLP trace receiver backed by the bounded trace store.
///
/// Ingestion is best-effort: malformed spans are dropped individually and
/// every well-formed request gets an empty success response.
#[derive(Clone)]
pub struct OtelReceiver {
    store: Arc<TraceStore>,
    echo_spans: bool,
}

impl OtelReceiver {
    /// Create a receiver writing to `store`, with span echo enabled.
    pub fn new(store: Arc<TraceStore>) -> Self {
        Self {
            store,
            echo_spans: true,
        }
    }

    /// Enable or disable the per-span echo line.
    pub fn with_echo(mut self, echo_spans: bool) -> Self {
        self.echo_spans = echo_spans;
        self
    }

    pub fn store(&self) -> &Arc<TraceStore> {
        &self.store
    }

    /// Wrap the receiver as a tonic service.
    pub fn into_server(self) -> TraceServiceServer<Self> {
        TraceServiceServer::new(self)
    }

    /// Normalizes every span in the request. Returns the spans in arrival
    /// order plus the number that had to be dropped.
    fn collect_spans(request: ExportTraceServiceRequest) -> (Vec<Span>, usize) {
        let mut spans = Vec::new();
        let mut dropped = 0;

        for resource_spans in request.resource_spans {
            let service_name = resource_spans
                .resource
                .as_ref()
                .map(|resource| extract_service_name(&resource.attributes))
                .unwrap_or_else(|| "unknown".to_string());

            for scope_spans in resource_spans.scope_spans {
                for otel_span in scope_spans.spans {
                    match convert_otel_span(otel_span, &service_name) {
                        Ok(span) => spans.push(span),
                        Err(e) => {
                            dropped += 1;
                            tracing::debug!(service = %service_name, error = %e, "Dropping span");
                        },
                    }
                }
            }
        }

        (spans, dropped)
    }
}

#[tonic::async_trait]
impl TraceService for OtelReceiver {
    async fn export(
        &self,
        request: Request<ExportTraceServiceRequest>,
    ) -> std::result::Result<Response<ExportTraceServiceResponse>, Status> {
        let (spans, dropped) = Self::collect_spans(request.into_inner());

        let echo_lines: Vec<String> = if self.echo_spans {
            spans.iter().map(format_span_line).collect()
        } else {
            Vec::new()
        };

        if !spans.is_empty() {
            let summary = self.store.ingest_spans(spans);
            tracing::debug!(
                retained = summary.retained,
                truncated = summary.truncated,
                duplicates = summary.duplicates,
                unplaced = summary.unplaced,
                merges = summary.merges,
                evictions = summary.evictions,
                dropped,
                "Processed OTLP export"
            );
        }

        // Store lock is released by now.
        for line in echo_lines {
            tracing::info!(target: SPAN_ECHO_TARGET, "{}", line);
        }

        Ok(Response::new(ExportTraceServiceResponse {
            partial_success: None,
        }))
    }
}

/// Extract service name from resource attributes.
fn extract_service_name(attributes: &[KeyValue]) -> String {
    attributes
        .iter()
        .find(|attr| attr.key == SERVICE_NAME)
        .and_then(|attr| extract_attribute_value(&attr.value))
        .map(|value| value.to_display_string())
        .unwrap_or_else(|| "unknown".into())
}

/// Extract a scalar attribute value. Arrays, maps and bytes are skipped.
fn extract_attribute_value(value: &Option<AnyValue>) -> Option<AttributeValue> {
    match value.as_ref()?.value.as_ref()? {
        any_value::Value::StringValue(s) => Some(AttributeValue::StringValue(s.clone())),
        any_value::Value::IntValue(i) => Some(AttributeValue::IntValue(*i)),
        any_value::Value::DoubleValue(d) => Some(AttributeValue::DoubleValue(*d)),
        any_value::Value::BoolValue(b) => Some(AttributeValue::BoolValue(*b)),
        _ => None,
    }
}

/// Convert an OTLP span into the normalized model.
fn convert_otel_span(
    otel_span: opentelemetry_proto::tonic::trace::v1::Span,
    service_name: &str,
) -> Result<Span> {
    let (wire_trace_id, span_id, parent_span_id) = extract_span_ids(&otel_span)?;

    let attributes = otel_span
        .attributes
        .iter()
        .filter_map(|attr| {
            extract_attribute_value(&attr.value).map(|value| Attribute {
                key: attr.key.clone(),
                value,
            })
        })
        .collect();

    Ok(Span {
        wire_trace_id,
        span_id,
        parent_span_id,
        name: otel_span.name,
        start_time_ns: otel_span.start_time_unix_nano,
        end_time_ns: otel_span.end_time_unix_nano,
        service_name: service_name.to_string(),
        attributes,
    })
}

/// Extract trace ID, span ID, and parent span ID from an OTLP span.
///
/// A child with an empty span ID is kept with an unassigned ID; the store
/// decides whether its parent is resident. A root with an empty span ID
/// would have to create a group and is rejected here.
fn extract_span_ids(
    otel_span: &opentelemetry_proto::tonic::trace::v1::Span,
) -> Result<(TraceId, SpanId, Option<SpanId>)> {
    if otel_span.trace_id.is_empty() {
        return Err(SpanlinkError::InvalidSpan("Invalid trace ID: empty".to_string()));
    }

    let trace_id = TraceId::from_bytes(&otel_span.trace_id)?;

    // An all-zero parent is how some exporters spell "no parent".
    let parent_span_id = if is_all_zeros(&otel_span.parent_span_id) {
        None
    } else {
        Some(SpanId::from_bytes(&otel_span.parent_span_id)?)
    };

    let span_id = match (otel_span.span_id.is_empty(), &parent_span_id) {
        (false, _) => SpanId::from_bytes(&otel_span.span_id)?,
        (true, Some(_)) => SpanId::unassigned(),
        (true, None) => {
            return Err(SpanlinkError::InvalidSpan("Invalid span ID: empty on a root span".to_string()));
        },
    };

    Ok((trace_id, span_id, parent_span_id))
}

fn is_all_zeros(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == 0)
}

/// One console line per accepted span:
/// `HH:MM:SS.mmm, trace=<8>, span=<8>, <service> <name> (<dur>s)`.
pub fn format_span_line(span: &Span) -> String {
    let start = crate::core::types::nanos_to_local(span.start_time_ns)
        .map(|dt| dt.format("%H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| "--:--:--.---".to_string());

    format!(
        "{}, trace={}, span={}, {} {} ({}s)",
        start,
        span.wire_trace_id.short(),
        span.span_id.short(),
        span.service_name,
        span.name,
        format_seconds(span.duration_ns())
    )
}

/// Seconds with at most three decimals and no trailing zeros.
fn format_seconds(nanos: u64) -> String {
    let formatted = format!("{:.3}", nanos as f64 / 1_000_000_000.0);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}
