use chrono::{DateTime, Duration, TimeZone, Utc};
use spandiff_core::model::span::{AttributeValue, Span, SpanStatus};

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()
}

/// Flat span with millisecond offsets from [`base_time`].
pub fn span(id: &str, parent: Option<&str>, name: &str, start_ms: i64, end_ms: i64) -> Span {
    Span {
        span_id: id.to_string(),
        trace_id: "trace-1".to_string(),
        parent_span_id: parent.map(str::to_string),
        name: name.to_string(),
        start_time: base_time() + Duration::milliseconds(start_ms),
        end_time: base_time() + Duration::milliseconds(end_ms),
        status: SpanStatus::Ok,
        attributes: Default::default(),
        events: Vec::new(),
        children: Vec::new(),
    }
}

pub fn with_attr(mut span: Span, key: &str, value: impl Into<AttributeValue>) -> Span {
    span.attributes.insert(key.to_string(), value.into());
    span
}

pub fn with_status(mut span: Span, status: SpanStatus) -> Span {
    span.status = status;
    span
}

/// A flat agent run: an `invoke_agent` root, two model calls, a tool call
/// nested under the first model call, and a parallel pair of tool calls.
pub fn sample_agent_trace(trace_id: &str) -> Vec<Span> {
    let spans = vec![
        with_attr(
            with_attr(
                span("root", None, "invoke_agent planner", 0, 5000),
                "gen_ai.operation.name",
                "invoke_agent",
            ),
            "gen_ai.agent.name",
            "planner",
        ),
        with_attr(
            with_attr(
                span("llm-1", Some("root"), "chat gpt-4o", 100, 1200),
                "gen_ai.operation.name",
                "chat",
            ),
            "gen_ai.request.model",
            "gpt-4o",
        ),
        with_attr(
            with_attr(
                span("tool-1", Some("llm-1"), "execute_tool search_web", 800, 1100),
                "gen_ai.operation.name",
                "execute_tool",
            ),
            "gen_ai.tool.name",
            "search_web",
        ),
        with_attr(
            span("tool-2", Some("root"), "execute_tool read_file", 1300, 2500),
            "gen_ai.tool.name",
            "read_file",
        ),
        with_attr(
            span("tool-3", Some("root"), "execute_tool read_file", 1500, 2400),
            "gen_ai.tool.name",
            "read_file",
        ),
        with_attr(
            with_attr(
                span("llm-2", Some("root"), "chat gpt-4o", 2600, 4800),
                "gen_ai.operation.name",
                "chat",
            ),
            "gen_ai.request.model",
            "gpt-4o",
        ),
    ];

    spans
        .into_iter()
        .map(|mut s| {
            s.trace_id = trace_id.to_string();
            s
        })
        .collect()
}

/// The input contract rendering of `spans`.
pub fn to_json(spans: &[Span]) -> String {
    serde_json::to_string_pretty(spans).unwrap()
}
