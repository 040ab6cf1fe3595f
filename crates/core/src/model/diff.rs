use serde::{Deserialize, Serialize};

use crate::model::category::CategorizedSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentKind {
    Matched,
    Modified,
    Added,
    Removed,
}

/// One entry of the aligned diff tree. `left_span` is set for matched,
/// modified and removed entries; `right_span` for matched, modified and added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignedSpanPair {
    #[serde(rename = "type")]
    pub kind: AlignmentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_span: Option<CategorizedSpan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_span: Option<CategorizedSpan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    #[serde(default)]
    pub children: Vec<AlignedSpanPair>,
}

impl AlignedSpanPair {
    /// The span to show for this entry, preferring the comparison side.
    pub fn primary_span(&self) -> Option<&CategorizedSpan> {
        self.right_span.as_ref().or(self.left_span.as_ref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonStats {
    pub total_left: usize,
    pub total_right: usize,
    pub matched: usize,
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
}

impl ComparisonStats {
    pub fn has_changes(&self) -> bool {
        self.added + self.removed + self.modified > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceComparisonResult {
    pub aligned_tree: Vec<AlignedSpanPair>,
    pub stats: ComparisonStats,
}
