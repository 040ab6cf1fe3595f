use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Agent,
    Llm,
    Tool,
    Error,
    Other,
}

/// Display metadata handed to renderers alongside each category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryMeta {
    pub label: &'static str,
    pub color: &'static str,
}

const AGENT_META: CategoryMeta = CategoryMeta {
    label: "Agent",
    color: "#8b5cf6",
};
const LLM_META: CategoryMeta = CategoryMeta {
    label: "LLM",
    color: "#3b82f6",
};
const TOOL_META: CategoryMeta = CategoryMeta {
    label: "Tool",
    color: "#10b981",
};
const ERROR_META: CategoryMeta = CategoryMeta {
    label: "Error",
    color: "#ef4444",
};
const OTHER_META: CategoryMeta = CategoryMeta {
    label: "Other",
    color: "#6b7280",
};

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Agent,
        Category::Llm,
        Category::Tool,
        Category::Error,
        Category::Other,
    ];

    pub fn meta(self) -> &'static CategoryMeta {
        match self {
            Self::Agent => &AGENT_META,
            Self::Llm => &LLM_META,
            Self::Tool => &TOOL_META,
            Self::Error => &ERROR_META,
            Self::Other => &OTHER_META,
        }
    }

    pub fn label(self) -> &'static str {
        self.meta().label
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Agent => "AGENT",
            Self::Llm => "LLM",
            Self::Tool => "TOOL",
            Self::Error => "ERROR",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A span with its semantic category. `span.children` is always empty; the
/// categorized subtree lives in `children`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizedSpan {
    pub span: Span,
    pub category: Category,
    pub category_label: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CategorizedSpan>,
}

impl CategorizedSpan {
    pub fn id(&self) -> &str {
        &self.span.span_id
    }

    pub fn duration_ms(&self) -> i64 {
        self.span.duration_ms()
    }

    /// Copy of this node without its subtree.
    pub fn detached(&self) -> CategorizedSpan {
        CategorizedSpan {
            span: self.span.detached(),
            category: self.category,
            category_label: self.category_label.clone(),
            display_name: self.display_name.clone(),
            children: Vec::new(),
        }
    }

    /// Same name, category and attribute map. Timing and ids are ignored.
    pub fn same_content(&self, other: &CategorizedSpan) -> bool {
        self.span.name == other.span.name
            && self.category == other.category
            && self.span.attributes == other.span.attributes
    }
}
