use crate::core::error::{Result, SpanlinkError};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trace identifier as attached by an exporter (hex encoded).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(String);

/// Span identifier (hex encoded).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpanId(String);

impl TraceId {
    /// Creates a new TraceId after validation
    pub fn new<S: Into<String>>(id: S) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(SpanlinkError::InvalidSpan("TraceId cannot be empty".to_string()));
        }
        // OTEL trace IDs are 16 bytes = 32 hex characters
        if id.len() > 32 {
            return Err(SpanlinkError::InvalidSpan(format!(
                "TraceId cannot exceed 32 characters, got {}",
                id.len()
            )));
        }
        Ok(TraceId(id))
    }

    /// Hex encodes raw wire bytes. Empty input yields an error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::new(hex::encode(bytes))
    }

    /// Returns the string representation of the trace ID
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, used in listings and console output.
    pub fn short(&self) -> &str {
        short_prefix(&self.0)
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SpanId {
    /// Creates a new SpanId after validation
    pub fn new<S: Into<String>>(id: S) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(SpanlinkError::InvalidSpan("SpanId cannot be empty".to_string()));
        }
        // OTEL span IDs are 8 bytes = 16 hex characters
        if id.len() > 16 {
            return Err(SpanlinkError::InvalidSpan(format!(
                "SpanId cannot exceed 16 characters, got {}",
                id.len()
            )));
        }
        Ok(SpanId(id))
    }

    /// Hex encodes raw wire bytes. Empty input yields an error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::new(hex::encode(bytes))
    }

    /// Placeholder for a span exported without an id. Such a span can join
    /// its parent's group but is never indexed.
    pub fn unassigned() -> Self {
        SpanId(String::new())
    }

    pub fn is_unassigned(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the string representation of the span ID
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, used in console output.
    pub fn short(&self) -> &str {
        short_prefix(&self.0)
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn short_prefix(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Typed attribute value, serialized in the OTLP/JSON shape
/// (`{"stringValue": ..}`, `{"intValue": "42"}`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeValue {
    StringValue(String),
    IntValue(#[serde(with = "int_as_string")] i64),
    DoubleValue(f64),
    BoolValue(bool),
}

impl AttributeValue {
    /// Plain string form used for `where` comparisons and display.
    ///
    /// Booleans are `True`/`False` and doubles always show a fraction or an
    /// exponent (`1.0`, `1e+20`, `1e-05`), so `--where flag=True` and
    /// `--where ratio=1.0` match what the tree view prints.
    pub fn to_display_string(&self) -> String {
        match self {
            AttributeValue::StringValue(s) => s.clone(),
            AttributeValue::IntValue(i) => i.to_string(),
            AttributeValue::DoubleValue(d) => format_double(*d),
            AttributeValue::BoolValue(true) => "True".to_string(),
            AttributeValue::BoolValue(false) => "False".to_string(),
        }
    }
}

fn format_double(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        // `{:e}` gives e.g. "1.5e-5"; exponents carry a sign and two digits.
        let formatted = format!("{:e}", value);
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) => {
                let (sign, digits) = match exponent.strip_prefix('-') {
                    Some(digits) => ('-', digits),
                    None => ('+', exponent),
                };
                format!("{}e{}{:0>2}", mantissa, sign, digits)
            },
            None => formatted,
        };
    }

    let formatted = value.to_string();
    if formatted.contains('.') {
        formatted
    } else {
        format!("{}.0", formatted)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::StringValue(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::StringValue(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::IntValue(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::DoubleValue(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::BoolValue(value)
    }
}

/// One span attribute. Keys are not unique within a span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: AttributeValue,
}

impl Attribute {
    pub fn new<K: Into<String>, V: Into<AttributeValue>>(key: K, value: V) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Normalized span. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    /// Trace id attached by the exporter; not authoritative for grouping
    #[serde(rename = "traceId")]
    pub wire_trace_id: TraceId,
    pub span_id: SpanId,
    /// `None` for root spans; serialized as an empty string
    #[serde(default, with = "optional_span_id")]
    pub parent_span_id: Option<SpanId>,
    pub name: String,
    #[serde(rename = "startTimeUnixNano", default, with = "nanos_as_string")]
    pub start_time_ns: u64,
    #[serde(rename = "endTimeUnixNano", default, with = "nanos_as_string")]
    pub end_time_ns: u64,
    #[serde(rename = "service")]
    pub service_name: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl Span {
    /// Creates a new span builder
    pub fn builder() -> SpanBuilder {
        SpanBuilder::default()
    }

    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    pub fn duration_ns(&self) -> u64 {
        self.end_time_ns.saturating_sub(self.start_time_ns)
    }

    /// Returns the first attribute with the given key
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.iter().find(|attr| attr.key == key).map(|attr| &attr.value)
    }

    /// True if any attribute carries `key` with the given string form
    pub fn has_attribute_value(&self, key: &str, value: &str) -> bool {
        self.attributes
            .iter()
            .any(|attr| attr.key == key && attr.value.to_display_string() == value)
    }
}

/// Builder for creating Span instances
#[derive(Default)]
pub struct SpanBuilder {
    wire_trace_id: Option<String>,
    span_id: Option<String>,
    parent_span_id: Option<String>,
    name: String,
    service_name: Option<String>,
    start_time_ns: u64,
    end_time_ns: u64,
    attributes: Vec<Attribute>,
}

impl SpanBuilder {
    pub fn trace_id<S: Into<String>>(mut self, trace_id: S) -> Self {
        self.wire_trace_id = Some(trace_id.into());
        self
    }

    pub fn span_id<S: Into<String>>(mut self, span_id: S) -> Self {
        self.span_id = Some(span_id.into());
        self
    }

    /// An empty parent id means "root"
    pub fn parent_span_id<S: Into<String>>(mut self, parent_span_id: S) -> Self {
        self.parent_span_id = Some(parent_span_id.into());
        self
    }

    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn service_name<S: Into<String>>(mut self, service_name: S) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    pub fn start_time_ns(mut self, start_time_ns: u64) -> Self {
        self.start_time_ns = start_time_ns;
        self
    }

    pub fn end_time_ns(mut self, end_time_ns: u64) -> Self {
        self.end_time_ns = end_time_ns;
        self
    }

    pub fn attribute<K: Into<String>, V: Into<AttributeValue>>(mut self, key: K, value: V) -> Self {
        self.attributes.push(Attribute::new(key, value));
        self
    }

    pub fn build(self) -> Result<Span> {
        let wire_trace_id = TraceId::new(
            self.wire_trace_id
                .ok_or_else(|| SpanlinkError::InvalidSpan("trace_id is required".to_string()))?,
        )?;
        let span_id = self
            .span_id
            .ok_or_else(|| SpanlinkError::InvalidSpan("span_id is required".to_string()))?;
        let parent_span_id = match self.parent_span_id {
            Some(parent) if !parent.is_empty() => Some(SpanId::new(parent)?),
            _ => None,
        };
        // Only a child may go without an id; a root would create a group.
        let span_id = if span_id.is_empty() && parent_span_id.is_some() {
            SpanId::unassigned()
        } else {
            SpanId::new(span_id)?
        };

        Ok(Span {
            wire_trace_id,
            span_id,
            parent_span_id,
            name: self.name,
            start_time_ns: self.start_time_ns,
            end_time_ns: self.end_time_ns,
            service_name: self.service_name.unwrap_or_else(|| "unknown".to_string()),
            attributes: self.attributes,
        })
    }
}

/// A logical trace as exposed by snapshots: the group key plus its retained spans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceGroup {
    /// Wire trace id of the span that created the group
    #[serde(rename = "trace_id")]
    pub group_key: TraceId,
    #[serde(default)]
    pub spans: Vec<Span>,
}

impl TraceGroup {
    pub fn new(group_key: TraceId, spans: Vec<Span>) -> Self {
        Self { group_key, spans }
    }

    pub fn summary(&self) -> TraceSummary {
        TraceSummary {
            group_key: self.group_key.clone(),
            start_ns: self.spans.iter().map(|s| s.start_time_ns).min().unwrap_or(0),
            end_ns: self.spans.iter().map(|s| s.end_time_ns).max().unwrap_or(0),
        }
    }

    /// Every attribute key present in any span of the trace
    pub fn attribute_keys(&self) -> impl Iterator<Item = &str> {
        self.spans
            .iter()
            .flat_map(|span| span.attributes.iter().map(|attr| attr.key.as_str()))
    }
}

/// Time bounds of a trace, computed over its retained spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceSummary {
    pub group_key: TraceId,
    pub start_ns: u64,
    pub end_ns: u64,
}

impl TraceSummary {
    pub fn total_ms(&self) -> f64 {
        self.end_ns.saturating_sub(self.start_ns) as f64 / 1_000_000.0
    }

    /// Local wall-clock start, or "unknown" when no start time is known
    pub fn timestamp(&self) -> String {
        if self.start_ns == 0 {
            return "unknown".to_string();
        }
        nanos_to_local(self.start_ns)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Query endpoint payload: `{"traces": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceSnapshot {
    #[serde(default)]
    pub traces: Vec<TraceGroup>,
}

/// Converts unix nanoseconds to local time.
pub fn nanos_to_local(nanos: u64) -> Option<DateTime<Local>> {
    let secs = i64::try_from(nanos / 1_000_000_000).ok()?;
    let subsec = (nanos % 1_000_000_000) as u32;
    DateTime::from_timestamp(secs, subsec).map(|dt| dt.with_timezone(&Local))
}

/// Current wall-clock time in unix nanoseconds.
pub fn now_unix_nanos() -> u64 {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .and_then(|nanos| u64::try_from(nanos).ok())
        .unwrap_or(0)
}

/// Accepts either a JSON string or a JSON number.
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber<T> {
    Number(T),
    Text(String),
}

mod nanos_as_string {
    use super::StringOrNumber;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match StringOrNumber::<u64>::deserialize(deserializer)? {
            StringOrNumber::Number(n) => Ok(n),
            StringOrNumber::Text(s) if s.is_empty() => Ok(0),
            StringOrNumber::Text(s) => s.parse().map_err(D::Error::custom),
        }
    }
}

mod int_as_string {
    use super::StringOrNumber;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        match StringOrNumber::<i64>::deserialize(deserializer)? {
            StringOrNumber::Number(n) => Ok(n),
            StringOrNumber::Text(s) => s.parse().map_err(D::Error::custom),
        }
    }
}

mod optional_span_id {
    use super::SpanId;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<SpanId>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.as_ref().map(SpanId::as_str).unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<SpanId>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        if raw.is_empty() {
            Ok(None)
        } else {
            Ok(Some(SpanId(raw)))
        }
    }
}
