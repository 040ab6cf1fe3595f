use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::error::{Result, SpanDiffError};

/// Parses an ISO-8601 / RFC3339 instant, or a bare integer taken as Unix
/// epoch milliseconds.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>> {
    let trimmed = input.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&Utc));
    }

    if let Ok(millis) = trimmed.parse::<i64>() {
        return Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| SpanDiffError::Parse(format!("timestamp out of range: {input}")));
    }

    Err(SpanDiffError::Parse(format!(
        "expected RFC3339 time or epoch millis, got {input}"
    )))
}

pub fn from_unix_nanos(nanos: u64) -> Result<DateTime<Utc>> {
    let secs = (nanos / 1_000_000_000) as i64;
    let subnanos = (nanos % 1_000_000_000) as u32;
    Utc.timestamp_opt(secs, subnanos)
        .single()
        .ok_or_else(|| SpanDiffError::Parse(format!("timestamp out of range: {nanos}ns")))
}

pub fn parse_duration_str(input: &str) -> Result<Duration> {
    humantime::parse_duration(input)
        .map_err(|e| SpanDiffError::Parse(format!("invalid duration {input}: {e}")))
}

/// Converts a std duration into a chrono delta, saturating on overflow.
pub fn to_delta(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339() {
        let ts = parse_timestamp("2026-01-01T00:00:00Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn parses_epoch_millis() {
        let ts = parse_timestamp("1767225600000").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn rejects_invalid() {
        assert!(parse_timestamp("nope").is_err());
        assert!(parse_duration_str("soon").is_err());
    }

    #[test]
    fn converts_nanos() {
        let ts = from_unix_nanos(1_700_000_000_250_000_000).unwrap();
        assert_eq!(ts.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn delta_from_millis() {
        assert_eq!(to_delta(Duration::from_millis(10)).num_milliseconds(), 10);
    }
}
