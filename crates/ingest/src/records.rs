//! Input-contract span records delivered as JSON.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use spandiff_core::error::{Result, SpanDiffError};
use spandiff_core::model::span::{AttributeValue, Attributes, Span, SpanEvent, SpanStatus};
use spandiff_core::time::parse_timestamp;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Payload {
    Bare(Vec<RawSpan>),
    Wrapped { spans: Vec<RawSpan> },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSpan {
    #[serde(default)]
    span_id: String,
    #[serde(default)]
    trace_id: String,
    #[serde(default)]
    parent_span_id: Option<String>,
    #[serde(default)]
    name: String,
    start_time: Value,
    end_time: Value,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    attributes: BTreeMap<String, Value>,
    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    name: String,
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(default)]
    attributes: BTreeMap<String, Value>,
}

/// Parses a JSON array of span records, or an object with a `spans` array.
/// Records without a span id are skipped.
pub fn parse_spans(text: &str) -> Result<Vec<Span>> {
    let payload: Payload = serde_json::from_str(text)
        .map_err(|e| SpanDiffError::Parse(format!("invalid span records: {e}")))?;
    let raw = match payload {
        Payload::Bare(spans) | Payload::Wrapped { spans } => spans,
    };

    let mut out = Vec::with_capacity(raw.len());
    for (i, record) in raw.into_iter().enumerate() {
        if record.span_id.is_empty() {
            tracing::warn!(index = i, name = %record.name, "skipping span record without spanId");
            continue;
        }
        out.push(convert(record)?);
    }
    Ok(out)
}

fn convert(raw: RawSpan) -> Result<Span> {
    let start_time = timestamp(&raw.start_time, &raw.span_id, "startTime")?;
    let end_time = timestamp(&raw.end_time, &raw.span_id, "endTime")?;
    let events = raw
        .events
        .into_iter()
        .map(|e| {
            Ok(SpanEvent {
                name: e.name,
                timestamp: e
                    .timestamp
                    .as_ref()
                    .map(|ts| timestamp(ts, &raw.span_id, "event timestamp"))
                    .transpose()?,
                attributes: attributes(e.attributes),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Span {
        span_id: raw.span_id,
        trace_id: raw.trace_id,
        parent_span_id: raw.parent_span_id.filter(|p| !p.is_empty()),
        name: raw.name,
        start_time,
        end_time,
        status: status(raw.status.as_deref()),
        attributes: attributes(raw.attributes),
        events,
        children: Vec::new(),
    })
}

fn timestamp(value: &Value, span_id: &str, field: &str) -> Result<DateTime<Utc>> {
    let parsed = match value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => parse_timestamp(&n.to_string()),
        other => Err(SpanDiffError::Parse(format!("unexpected {other}"))),
    };
    parsed.map_err(|e| SpanDiffError::Parse(format!("span {span_id}: bad {field}: {e}")))
}

fn status(raw: Option<&str>) -> SpanStatus {
    match raw.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
        Some("OK" | "STATUS_CODE_OK") => SpanStatus::Ok,
        Some("ERROR" | "STATUS_CODE_ERROR") => SpanStatus::Error,
        _ => SpanStatus::Unset,
    }
}

/// Scalars map directly; nulls are dropped; arrays and objects are kept as
/// their JSON text.
pub(crate) fn attributes(raw: BTreeMap<String, Value>) -> Attributes {
    raw.into_iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::Null => return None,
                Value::Bool(b) => AttributeValue::Bool(b),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => AttributeValue::Int(i),
                    None => AttributeValue::Float(n.as_f64().unwrap_or_default()),
                },
                Value::String(s) => AttributeValue::String(s),
                composite @ (Value::Array(_) | Value::Object(_)) => {
                    AttributeValue::String(composite.to_string())
                }
            };
            Some((key, value))
        })
        .collect()
}
