mod decode;

use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use prost::Message;
use spandiff_core::error::{Result, SpanDiffError};
use spandiff_core::model::span::Span;

pub use decode::decode_span;

/// Decodes a protobuf `ExportTraceServiceRequest` into flat spans.
pub fn decode_export(bytes: &[u8]) -> Result<Vec<Span>> {
    let request = ExportTraceServiceRequest::decode(bytes)
        .map_err(|e| SpanDiffError::Parse(format!("invalid otlp trace export: {e}")))?;
    Ok(spans_from_request(&request))
}

pub fn spans_from_request(request: &ExportTraceServiceRequest) -> Vec<Span> {
    let mut out = Vec::new();
    for resource_spans in &request.resource_spans {
        for scope_spans in &resource_spans.scope_spans {
            for span in &scope_spans.spans {
                match decode_span(span) {
                    Some(decoded) => out.push(decoded),
                    None => tracing::warn!(name = %span.name, "skipping otlp span without span id"),
                }
            }
        }
    }
    out
}
