pub mod otlp;
pub mod records;

use std::io::Read;
use std::str::FromStr;

use flate2::read::GzDecoder;
use spandiff_core::error::{Result, SpanDiffError};
use spandiff_core::model::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputFormat {
    /// Input-contract span records as JSON.
    #[default]
    Json,
    /// A protobuf `ExportTraceServiceRequest`.
    Otlp,
}

impl FromStr for InputFormat {
    type Err = SpanDiffError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "otlp" | "protobuf" | "pb" => Ok(Self::Otlp),
            _ => Err(SpanDiffError::InvalidArgument(format!(
                "unknown input format: {s} (expected json or otlp)"
            ))),
        }
    }
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Decodes a delivered payload into flat spans, transparently inflating
/// gzip-compressed input.
pub fn load_spans(payload: &[u8], format: InputFormat) -> Result<Vec<Span>> {
    let inflated;
    let bytes = if payload.starts_with(&GZIP_MAGIC) {
        let mut out = Vec::new();
        GzDecoder::new(payload)
            .read_to_end(&mut out)
            .map_err(|e| SpanDiffError::Io(format!("gzip decode failed: {e}")))?;
        inflated = out;
        inflated.as_slice()
    } else {
        payload
    };

    let spans = match format {
        InputFormat::Json => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| SpanDiffError::Parse(format!("span payload is not utf8: {e}")))?;
            records::parse_spans(text)?
        }
        InputFormat::Otlp => otlp::decode_export(bytes)?,
    };
    tracing::debug!(count = spans.len(), ?format, "decoded span payload");
    Ok(spans)
}
