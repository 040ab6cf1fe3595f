use chrono::{DateTime, Utc};
use opentelemetry_proto::tonic::common::v1::any_value::Value;
use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue};
use opentelemetry_proto::tonic::trace::v1::Span as OtlpSpan;
use spandiff_core::model::span::{AttributeValue, Attributes, Span, SpanEvent, SpanStatus};
use spandiff_core::time::from_unix_nanos;

const STATUS_CODE_OK: i32 = 1;
const STATUS_CODE_ERROR: i32 = 2;

/// Converts one OTLP span. Returns `None` when the span has no id.
pub fn decode_span(span: &OtlpSpan) -> Option<Span> {
    let span_id = bytes_to_hex(&span.span_id)?;
    let events = span
        .events
        .iter()
        .map(|e| SpanEvent {
            name: e.name.clone(),
            timestamp: (e.time_unix_nano != 0).then(|| nanos_to_dt(e.time_unix_nano)),
            attributes: kv_to_attributes(&e.attributes),
        })
        .collect();

    let status = match span.status.as_ref().map(|s| s.code) {
        Some(STATUS_CODE_ERROR) => SpanStatus::Error,
        Some(STATUS_CODE_OK) => SpanStatus::Ok,
        _ => SpanStatus::Unset,
    };

    Some(Span {
        span_id,
        trace_id: bytes_to_hex(&span.trace_id).unwrap_or_default(),
        parent_span_id: bytes_to_hex(&span.parent_span_id),
        name: span.name.clone(),
        start_time: nanos_to_dt(span.start_time_unix_nano),
        end_time: nanos_to_dt(span.end_time_unix_nano),
        status,
        attributes: kv_to_attributes(&span.attributes),
        events,
        children: Vec::new(),
    })
}

fn kv_to_attributes(attrs: &[KeyValue]) -> Attributes {
    attrs
        .iter()
        .filter_map(|kv| Some((kv.key.clone(), any_value(kv.value.as_ref())?)))
        .collect()
}

fn any_value(value: Option<&AnyValue>) -> Option<AttributeValue> {
    let value = match value?.value.as_ref()? {
        Value::StringValue(s) => AttributeValue::String(s.clone()),
        Value::BoolValue(b) => AttributeValue::Bool(*b),
        Value::IntValue(i) => AttributeValue::Int(*i),
        Value::DoubleValue(d) => AttributeValue::Float(*d),
        Value::BytesValue(b) => AttributeValue::String(String::from_utf8_lossy(b).to_string()),
        composite => AttributeValue::String(composite_to_json(composite).to_string()),
    };
    Some(value)
}

fn composite_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::StringValue(s) => serde_json::Value::String(s.clone()),
        Value::BoolValue(b) => serde_json::Value::Bool(*b),
        Value::IntValue(i) => serde_json::Value::from(*i),
        Value::DoubleValue(d) => serde_json::Value::from(*d),
        Value::BytesValue(b) => serde_json::Value::String(bytes_to_hex(b).unwrap_or_default()),
        Value::ArrayValue(array) => serde_json::Value::Array(
            array
                .values
                .iter()
                .map(|v| v.value.as_ref().map(composite_to_json).unwrap_or_default())
                .collect(),
        ),
        Value::KvlistValue(list) => serde_json::Value::Object(
            list.values
                .iter()
                .map(|kv| {
                    let v = kv
                        .value
                        .as_ref()
                        .and_then(|v| v.value.as_ref())
                        .map(composite_to_json)
                        .unwrap_or_default();
                    (kv.key.clone(), v)
                })
                .collect(),
        ),
    }
}

fn bytes_to_hex(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    Some(bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
}

fn nanos_to_dt(nanos: u64) -> DateTime<Utc> {
    from_unix_nanos(nanos).unwrap_or(DateTime::UNIX_EPOCH)
}
