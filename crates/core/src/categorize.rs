//! Rule-based span categorization.
//!
//! Rules apply in order and the first match wins: error status, the
//! `gen_ai.operation.name` attribute, then name patterns (LLM, tool, agent).

use crate::model::category::{CategorizedSpan, Category};
use crate::model::span::Span;
use crate::semconv;

const AGENT_OPERATIONS: &[&str] = &[
    semconv::OP_INVOKE_AGENT,
    semconv::OP_CREATE_AGENT,
    "agent",
];

const LLM_OPERATIONS: &[&str] = &[
    semconv::OP_CHAT,
    semconv::OP_TEXT_COMPLETION,
    semconv::OP_GENERATE_CONTENT,
    semconv::OP_EMBEDDINGS,
    "completion",
];

const TOOL_OPERATIONS: &[&str] = &[semconv::OP_EXECUTE_TOOL, "tool", "function"];

#[derive(Debug, Clone, Copy)]
enum NamePattern {
    /// Case-insensitive substring.
    Contains(&'static str),
    /// Whole alphanumeric token, so `run` does not hit `truncate`.
    Word(&'static str),
}

impl NamePattern {
    fn matches(self, lowered: &str) -> bool {
        match self {
            Self::Contains(needle) => lowered.contains(needle),
            Self::Word(word) => lowered
                .split(|c: char| !c.is_ascii_alphanumeric())
                .any(|token| token == word),
        }
    }
}

const LLM_NAME_PATTERNS: &[NamePattern] = &[
    NamePattern::Contains("chat.completions"),
    NamePattern::Contains("chatcompletion"),
    NamePattern::Contains("text_completion"),
    NamePattern::Contains("generate_content"),
    NamePattern::Contains("invoke_model"),
    NamePattern::Contains("openai"),
    NamePattern::Contains("anthropic"),
    NamePattern::Contains("bedrock"),
    NamePattern::Contains("gemini"),
    NamePattern::Contains("vertexai"),
    NamePattern::Contains("ollama"),
    NamePattern::Contains("mistral"),
    NamePattern::Word("chat"),
    NamePattern::Word("llm"),
    NamePattern::Word("completion"),
    NamePattern::Word("embeddings"),
    NamePattern::Word("converse"),
];

const TOOL_NAME_PATTERNS: &[NamePattern] = &[
    NamePattern::Contains("execute_tool"),
    NamePattern::Contains("tool_call"),
    NamePattern::Contains("function_call"),
    NamePattern::Word("tool"),
    NamePattern::Word("tools"),
    NamePattern::Word("function"),
    NamePattern::Word("mcp"),
];

const AGENT_NAME_PATTERNS: &[NamePattern] = &[
    NamePattern::Contains("invoke_agent"),
    NamePattern::Contains("create_agent"),
    NamePattern::Contains("agent"),
    NamePattern::Contains("orchestrat"),
    NamePattern::Contains("workflow"),
    NamePattern::Word("run"),
    NamePattern::Word("process"),
    NamePattern::Word("processing"),
];

/// Categorizes one span, ignoring its children.
pub fn categorize_span(span: &Span) -> Category {
    if span.is_error() {
        return Category::Error;
    }

    if let Some(category) = span
        .attr_str(semconv::OPERATION_NAME)
        .and_then(category_for_operation)
    {
        return category;
    }

    let lowered = span.name.to_ascii_lowercase();
    if matches_any(LLM_NAME_PATTERNS, &lowered) {
        Category::Llm
    } else if matches_any(TOOL_NAME_PATTERNS, &lowered) {
        Category::Tool
    } else if matches_any(AGENT_NAME_PATTERNS, &lowered) {
        Category::Agent
    } else {
        Category::Other
    }
}

fn category_for_operation(operation: &str) -> Option<Category> {
    let op = operation.to_ascii_lowercase();
    if AGENT_OPERATIONS.contains(&op.as_str()) {
        Some(Category::Agent)
    } else if LLM_OPERATIONS.contains(&op.as_str()) {
        Some(Category::Llm)
    } else if TOOL_OPERATIONS.contains(&op.as_str()) {
        Some(Category::Tool)
    } else {
        None
    }
}

fn matches_any(patterns: &[NamePattern], lowered: &str) -> bool {
    patterns.iter().any(|p| p.matches(lowered))
}

pub fn display_name(span: &Span, category: Category) -> String {
    let op = span.attr_str(semconv::OPERATION_NAME);
    let parts: Vec<&str> = match category {
        Category::Agent => vec![op, span.attr_str(semconv::AGENT_NAME)],
        Category::Llm => vec![op, provider_name(span), model_name(span).map(short_model_name)],
        Category::Tool => vec![op, span.attr_str(semconv::TOOL_NAME)],
        Category::Error | Category::Other => Vec::new(),
    }
    .into_iter()
    .flatten()
    .collect();

    if parts.is_empty() {
        span.name.clone()
    } else {
        parts.join(" ")
    }
}

pub fn provider_name(span: &Span) -> Option<&str> {
    span.attr_str(semconv::PROVIDER_NAME)
        .or_else(|| span.attr_str(semconv::SYSTEM))
}

pub fn model_name(span: &Span) -> Option<&str> {
    span.attr_str(semconv::REQUEST_MODEL)
        .or_else(|| span.attr_str(semconv::RESPONSE_MODEL))
}

/// Drops any path or vendor prefix: `models/gemini-1.5-pro` becomes
/// `gemini-1.5-pro`, `us.anthropic.claude-3-haiku` becomes `claude-3-haiku`.
pub fn short_model_name(model: &str) -> &str {
    let tail = model.rsplit('/').next().unwrap_or(model);
    match tail.rsplit_once('.') {
        Some((prefix, rest))
            if !rest.is_empty()
                && prefix.chars().all(|c| c.is_ascii_alphabetic() || c == '.')
                && rest.starts_with(|c: char| c.is_ascii_alphabetic()) =>
        {
            rest
        }
        _ => tail,
    }
}

/// Categorizes a span and its whole subtree.
pub fn categorize(mut span: Span) -> CategorizedSpan {
    let category = categorize_span(&span);
    let display_name = display_name(&span, category);
    let children = std::mem::take(&mut span.children);

    CategorizedSpan {
        span,
        category,
        category_label: category.label().to_string(),
        display_name,
        children: children.into_iter().map(categorize).collect(),
    }
}

pub fn categorize_tree(roots: Vec<Span>) -> Vec<CategorizedSpan> {
    let categorized = roots.into_iter().map(categorize).collect::<Vec<_>>();
    tracing::debug!(roots = categorized.len(), "categorized trace tree");
    categorized
}
