//! Rollups over a categorized trace: time per category, tool usage and a
//! trace summary.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::category::{CategorizedSpan, Category};
use crate::semconv;
use crate::tree::{count_spans, flatten, trace_duration_ms};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBreakdown {
    pub category: Category,
    pub label: String,
    pub color: String,
    pub count: usize,
    pub duration_ms: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUsage {
    pub tool_name: String,
    pub count: usize,
    pub total_duration_ms: i64,
}

impl ToolUsage {
    pub fn avg_duration_ms(&self) -> i64 {
        if self.count == 0 {
            0
        } else {
            self.total_duration_ms / self.count as i64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceSummary {
    pub span_count: usize,
    pub root_count: usize,
    pub error_count: usize,
    pub duration_ms: i64,
    pub tokens: TokenUsage,
}

/// Per-category span count and summed duration. Percentages are shares of
/// the summed category durations, not of wall-clock time, since nested
/// spans overlap; they add up to 100 whenever any span has a duration.
/// Categories without spans are omitted.
pub fn category_breakdown(roots: &[CategorizedSpan]) -> Vec<CategoryBreakdown> {
    let mut counts: HashMap<Category, (usize, i64)> = HashMap::new();
    for span in flatten(roots) {
        let entry = counts.entry(span.category).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += span.duration_ms();
    }

    let total: i64 = counts.values().map(|(_, d)| d).sum();
    Category::ALL
        .iter()
        .filter_map(|&category| {
            let &(count, duration_ms) = counts.get(&category)?;
            let meta = category.meta();
            Some(CategoryBreakdown {
                category,
                label: meta.label.to_string(),
                color: meta.color.to_string(),
                count,
                duration_ms,
                percentage: if total > 0 {
                    duration_ms as f64 / total as f64 * 100.0
                } else {
                    0.0
                },
            })
        })
        .collect()
}

static TOOL_NAME_IN_SPAN_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:execute_tool|tool(?:[._ ]?call)?|function(?:[._ ]?call)?)[\s:./_-]+(\S+)")
        .expect("tool name pattern is valid")
});

/// Tool name from `gen_ai.tool.name`, else parsed from span names such as
/// `execute_tool search_web` or `tool:read_file`, else the span name.
pub fn extract_tool_name(span: &CategorizedSpan) -> String {
    if let Some(name) = span.span.attr_str(semconv::TOOL_NAME) {
        return name.to_string();
    }
    TOOL_NAME_IN_SPAN_NAME
        .captures(&span.span.name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| span.span.name.clone())
}

/// TOOL spans grouped by tool name, most used first.
pub fn tool_usage(roots: &[CategorizedSpan]) -> Vec<ToolUsage> {
    let mut by_tool: HashMap<String, ToolUsage> = HashMap::new();
    for span in flatten(roots)
        .into_iter()
        .filter(|s| s.category == Category::Tool)
    {
        let name = extract_tool_name(span);
        let entry = by_tool.entry(name.clone()).or_insert_with(|| ToolUsage {
            tool_name: name,
            count: 0,
            total_duration_ms: 0,
        });
        entry.count += 1;
        entry.total_duration_ms += span.duration_ms();
    }

    let mut out = by_tool.into_values().collect::<Vec<_>>();
    out.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.tool_name.cmp(&b.tool_name))
    });
    out
}

pub fn token_usage(roots: &[CategorizedSpan]) -> TokenUsage {
    let read = |span: &CategorizedSpan, key: &str| {
        span.span
            .attr(key)
            .and_then(|v| v.as_i64())
            .map_or(0, |v| v.max(0) as u64)
    };
    flatten(roots)
        .into_iter()
        .fold(TokenUsage::default(), |acc, span| TokenUsage {
            input_tokens: acc
                .input_tokens
                .saturating_add(read(span, semconv::USAGE_INPUT_TOKENS)),
            output_tokens: acc
                .output_tokens
                .saturating_add(read(span, semconv::USAGE_OUTPUT_TOKENS)),
        })
}

pub fn summarize(roots: &[CategorizedSpan]) -> TraceSummary {
    TraceSummary {
        span_count: count_spans(roots),
        root_count: roots.len(),
        error_count: flatten(roots)
            .into_iter()
            .filter(|s| s.span.is_error())
            .count(),
        duration_ms: trace_duration_ms(roots),
        tokens: token_usage(roots),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::categorize::categorize;
    use crate::model::span::{AttributeValue, Span, SpanStatus};

    fn span(name: &str, start_ms: i64, end_ms: i64, attrs: &[(&str, AttributeValue)]) -> Span {
        let base = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        Span {
            span_id: name.to_string(),
            trace_id: "t".to_string(),
            parent_span_id: None,
            name: name.to_string(),
            start_time: base + Duration::milliseconds(start_ms),
            end_time: base + Duration::milliseconds(end_ms),
            status: SpanStatus::Ok,
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            events: Vec::new(),
            children: Vec::new(),
        }
    }

    fn sample() -> Vec<CategorizedSpan> {
        let mut root = span("Runner.run", 0, 1000, &[]);
        root.children = vec![
            span(
                "chat",
                0,
                400,
                &[
                    ("gen_ai.usage.input_tokens", AttributeValue::Int(120)),
                    ("gen_ai.usage.output_tokens", AttributeValue::from("30")),
                ],
            ),
            span("execute_tool search_web", 400, 600, &[]),
            span(
                "execute_tool",
                600,
                700,
                &[("gen_ai.tool.name", AttributeValue::from("search_web"))],
            ),
            span("tool:read_file", 700, 1000, &[]),
        ];
        vec![categorize(root)]
    }

    #[test]
    fn breakdown_percentages_sum_to_hundred() {
        let rows = category_breakdown(&sample());
        let categories = rows.iter().map(|r| r.category).collect::<Vec<_>>();
        assert_eq!(categories, vec![Category::Agent, Category::Llm, Category::Tool]);

        let tool = rows.iter().find(|r| r.category == Category::Tool).unwrap();
        assert_eq!(tool.count, 3);
        assert_eq!(tool.duration_ms, 600);

        let total: f64 = rows.iter().map(|r| r.percentage).sum();
        assert!((total - 100.0).abs() < 1e-9);
        assert!((rows[0].percentage - 50.0).abs() < 1e-9);
    }

    #[test]
    fn breakdown_of_zero_durations_is_zero_percent() {
        let rows = category_breakdown(&[categorize(span("chat", 0, 0, &[]))]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].percentage, 0.0);
    }

    #[test]
    fn tool_usage_groups_by_extracted_name() {
        let usage = tool_usage(&sample());
        assert_eq!(usage.len(), 2);
        assert_eq!(usage[0].tool_name, "search_web");
        assert_eq!(usage[0].count, 2);
        assert_eq!(usage[0].total_duration_ms, 300);
        assert_eq!(usage[0].avg_duration_ms(), 150);
        assert_eq!(usage[1].tool_name, "read_file");
    }

    #[test]
    fn tool_name_falls_back_to_span_name() {
        let s = categorize(span("mcp", 0, 10, &[]));
        assert_eq!(extract_tool_name(&s), "mcp");
    }

    #[test]
    fn summary_counts_tokens_and_errors() {
        let mut roots = sample();
        roots[0].children[1].span.status = SpanStatus::Error;
        let summary = summarize(&roots);
        assert_eq!(summary.span_count, 5);
        assert_eq!(summary.root_count, 1);
        assert_eq!(summary.error_count, 1);
        assert_eq!(summary.duration_ms, 1000);
        assert_eq!(summary.tokens.total(), 150);
    }

    #[test]
    fn token_sums_saturate() {
        let huge = || span(
            "chat gpt-4o",
            0,
            10,
            &[
                ("gen_ai.usage.input_tokens", AttributeValue::Int(i64::MAX)),
                ("gen_ai.usage.output_tokens", AttributeValue::Int(i64::MAX)),
            ],
        );
        let roots: Vec<_> = (0..3).map(|_| categorize(huge())).collect();
        let tokens = token_usage(&roots);
        assert_eq!(tokens.input_tokens, u64::MAX);
        assert_eq!(tokens.output_tokens, u64::MAX);
        assert_eq!(tokens.total(), u64::MAX);
    }
}
