use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::categorize::model_name;
use crate::error::{Result, SpanDiffError};
use crate::model::category::{CategorizedSpan, Category};
use crate::model::span::Span;
use crate::semconv;

pub const CATEGORY_WEIGHT: f64 = 0.30;
pub const OPERATION_WEIGHT: f64 = 0.30;
pub const IDENTITY_WEIGHT: f64 = 0.25;
pub const DURATION_WEIGHT: f64 = 0.15;

/// Pairwise similarity between two spans at the same tree level, in [0, 1].
pub trait SimilarityScorer {
    fn score(&self, left: &CategorizedSpan, right: &CategorizedSpan) -> f64;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyArgument {
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// Per tool name, the call arguments that decide whether two invocations of
/// that tool did the same thing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolSimilarityConfig(BTreeMap<String, Vec<KeyArgument>>);

impl ToolSimilarityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, tool: &str, keys: Vec<KeyArgument>) -> Self {
        self.0.insert(tool.to_string(), keys);
        self
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(raw)
            .map_err(|e| SpanDiffError::Config(format!("failed parsing tool config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| SpanDiffError::Io(format!("failed reading {}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn key_arguments(&self, tool: &str) -> &[KeyArgument] {
        self.0.get(tool).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn validate(&self) -> Result<()> {
        for (tool, keys) in &self.0 {
            if let Some(bad) = keys
                .iter()
                .find(|k| !k.weight.is_finite() || k.weight < 0.0 || k.name.is_empty())
            {
                return Err(SpanDiffError::Config(format!(
                    "tool {tool}: key argument {:?} needs a name and a finite, non-negative weight",
                    bad.name
                )));
            }
        }
        Ok(())
    }
}

/// The default weighted scorer: category 0.30, operation 0.30, identity or
/// key tool arguments 0.25, duration ratio 0.15.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpanSimilarity<'a> {
    tools: Option<&'a ToolSimilarityConfig>,
}

impl<'a> SpanSimilarity<'a> {
    pub fn new(tools: Option<&'a ToolSimilarityConfig>) -> Self {
        Self {
            tools: tools.filter(|t| !t.is_empty()),
        }
    }
}

impl SimilarityScorer for SpanSimilarity<'_> {
    fn score(&self, left: &CategorizedSpan, right: &CategorizedSpan) -> f64 {
        let mut score = 0.0;
        if left.category == right.category {
            score += CATEGORY_WEIGHT;
        }
        if operation(&left.span) == operation(&right.span) {
            score += OPERATION_WEIGHT;
        }

        let key_args = (left.category == Category::Tool && right.category == Category::Tool)
            .then_some(self.tools)
            .flatten()
            .and_then(|tools| key_argument_match(tools, &left.span, &right.span));
        score += IDENTITY_WEIGHT
            * key_args.unwrap_or_else(|| identity_match(&left.span, &right.span));

        score += DURATION_WEIGHT * duration_ratio(left.duration_ms(), right.duration_ms());
        score.clamp(0.0, 1.0)
    }
}

fn operation(span: &Span) -> &str {
    span.attr_str(semconv::OPERATION_NAME).unwrap_or(&span.name)
}

/// 1.0 when any of agent, model or tool name is present on both sides and
/// equal, or when neither side carries any of them.
fn identity_match(left: &Span, right: &Span) -> f64 {
    let pairs = [
        (
            left.attr_str(semconv::AGENT_NAME),
            right.attr_str(semconv::AGENT_NAME),
        ),
        (model_name(left), model_name(right)),
        (
            left.attr_str(semconv::TOOL_NAME),
            right.attr_str(semconv::TOOL_NAME),
        ),
    ];

    if pairs.iter().any(|(l, r)| l.is_some() && l == r) {
        return 1.0;
    }
    if pairs.iter().all(|(l, r)| l.is_none() && r.is_none()) {
        return 1.0;
    }
    0.0
}

/// Weighted share of configured key arguments that agree, or `None` when the
/// tool has no configured keys.
fn key_argument_match(tools: &ToolSimilarityConfig, left: &Span, right: &Span) -> Option<f64> {
    let tool = left.attr_str(semconv::TOOL_NAME)?;
    let keys = tools.key_arguments(tool);
    if keys.is_empty() {
        return None;
    }
    if right.attr_str(semconv::TOOL_NAME) != Some(tool) {
        return Some(0.0);
    }

    let left_args = tool_arguments(left);
    let right_args = tool_arguments(right);
    let total: f64 = keys.iter().map(|k| k.weight).sum();
    if total <= 0.0 {
        return Some(1.0);
    }
    let agreeing: f64 = keys
        .iter()
        .filter(|k| argument(&left_args, left, &k.name) == argument(&right_args, right, &k.name))
        .map(|k| k.weight)
        .sum();
    Some(agreeing / total)
}

fn tool_arguments(span: &Span) -> serde_json::Map<String, serde_json::Value> {
    span.attr_str(semconv::TOOL_CALL_ARGUMENTS)
        .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
        .and_then(|v| match v {
            serde_json::Value::Object(map) => Some(map),
            _ => None,
        })
        .unwrap_or_default()
}

/// Argument from the JSON arguments blob, else from a flattened
/// `gen_ai.tool.call.arguments.<name>` attribute.
fn argument(
    parsed: &serde_json::Map<String, serde_json::Value>,
    span: &Span,
    name: &str,
) -> Option<serde_json::Value> {
    parsed.get(name).cloned().or_else(|| {
        span.attr(&format!("{}.{name}", semconv::TOOL_CALL_ARGUMENTS))
            .and_then(|v| serde_json::to_value(v).ok())
    })
}

/// `min/max` of the two durations; 1.0 when either is zero.
pub fn duration_ratio(left_ms: i64, right_ms: i64) -> f64 {
    if left_ms <= 0 || right_ms <= 0 {
        return 1.0;
    }
    left_ms.min(right_ms) as f64 / left_ms.max(right_ms) as f64
}
