//! Structural diff of two categorized trees.
//!
//! Alignment is per sibling level: a Needleman-Wunsch style sequence
//! alignment pairs the children of two matched spans, preserving relative
//! order. Spans are never matched across depths.

pub mod similarity;

use crate::config::AlignConfig;
use crate::model::category::CategorizedSpan;
use crate::model::diff::{AlignedSpanPair, AlignmentKind, ComparisonStats, TraceComparisonResult};
use crate::tree::count_spans;

use self::similarity::{SimilarityScorer, SpanSimilarity, ToolSimilarityConfig};

/// DP score for a diagonal step whose pair is below the match threshold.
///
/// Two gaps (-0.2) always beat this, so a pair scoring under the match
/// threshold is never taken as a diagonal step: it surfaces as `removed`
/// plus `added`, and the `modified_threshold` band of `classify` stays
/// unreachable from the DP. Keep it that way; raising this penalty changes
/// which pairs the diff reports.
pub const MISMATCH_PENALTY: f64 = -0.5;
/// DP score for consuming a span from one side only.
pub const GAP_PENALTY: f64 = -0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Diagonal,
    Up,
    Left,
}

/// Compares two trees with the default scorer and thresholds.
pub fn compare_traces(
    left: &[CategorizedSpan],
    right: &[CategorizedSpan],
    tools: Option<&ToolSimilarityConfig>,
) -> TraceComparisonResult {
    let scorer = SpanSimilarity::new(tools);
    Aligner::new(&scorer, AlignConfig::default()).compare(left, right)
}

pub struct Aligner<'a, S: SimilarityScorer> {
    scorer: &'a S,
    config: AlignConfig,
}

impl<'a, S: SimilarityScorer> Aligner<'a, S> {
    pub fn new(scorer: &'a S, config: AlignConfig) -> Self {
        Self { scorer, config }
    }

    pub fn compare(
        &self,
        left: &[CategorizedSpan],
        right: &[CategorizedSpan],
    ) -> TraceComparisonResult {
        let aligned_tree = self.align_level(left, right);
        let mut stats = ComparisonStats {
            total_left: count_spans(left),
            total_right: count_spans(right),
            ..ComparisonStats::default()
        };
        tally(&aligned_tree, &mut stats);
        tracing::debug!(
            total_left = stats.total_left,
            total_right = stats.total_right,
            matched = stats.matched,
            modified = stats.modified,
            added = stats.added,
            removed = stats.removed,
            "aligned traces"
        );
        TraceComparisonResult {
            aligned_tree,
            stats,
        }
    }

    /// Aligns two sibling sequences and, recursively, the children of every
    /// paired entry.
    pub fn align_level(
        &self,
        left: &[CategorizedSpan],
        right: &[CategorizedSpan],
    ) -> Vec<AlignedSpanPair> {
        if left.is_empty() {
            return right.iter().map(|s| one_sided(s, AlignmentKind::Added)).collect();
        }
        if right.is_empty() {
            return left
                .iter()
                .map(|s| one_sided(s, AlignmentKind::Removed))
                .collect();
        }

        let n = left.len();
        let m = right.len();
        let similarity: Vec<Vec<f64>> = left
            .iter()
            .map(|l| right.iter().map(|r| self.scorer.score(l, r)).collect())
            .collect();

        let mut dp = vec![vec![0.0_f64; m + 1]; n + 1];
        let mut steps = vec![vec![Step::Diagonal; m + 1]; n + 1];
        for i in 1..=n {
            dp[i][0] = dp[i - 1][0] + GAP_PENALTY;
            steps[i][0] = Step::Up;
        }
        for j in 1..=m {
            dp[0][j] = dp[0][j - 1] + GAP_PENALTY;
            steps[0][j] = Step::Left;
        }

        for i in 1..=n {
            for j in 1..=m {
                let s = similarity[i - 1][j - 1];
                let pair_score = if s >= self.config.match_threshold {
                    s
                } else {
                    MISMATCH_PENALTY
                };
                let diagonal = dp[i - 1][j - 1] + pair_score;
                let up = dp[i - 1][j] + GAP_PENALTY;
                let left_gap = dp[i][j - 1] + GAP_PENALTY;

                // Ties prefer pairing, then the comparison side, so removed
                // entries precede added ones once the backtrack is reversed.
                let (best, step) = if diagonal >= up && diagonal >= left_gap {
                    (diagonal, Step::Diagonal)
                } else if left_gap >= up {
                    (left_gap, Step::Left)
                } else {
                    (up, Step::Up)
                };
                dp[i][j] = best;
                steps[i][j] = step;
            }
        }

        // Backtracking walks from the end, so entries are pushed last-first
        // and reversed once at the end.
        let mut out = Vec::with_capacity(n.max(m));
        let (mut i, mut j) = (n, m);
        while i > 0 || j > 0 {
            match steps[i][j] {
                Step::Diagonal if i > 0 && j > 0 => {
                    let (l, r) = (&left[i - 1], &right[j - 1]);
                    match self.classify(similarity[i - 1][j - 1], l, r) {
                        Some(kind) => out.push(self.pair(kind, l, r, similarity[i - 1][j - 1])),
                        None => {
                            out.push(one_sided(r, AlignmentKind::Added));
                            out.push(one_sided(l, AlignmentKind::Removed));
                        }
                    }
                    i -= 1;
                    j -= 1;
                }
                Step::Left if j > 0 => {
                    out.push(one_sided(&right[j - 1], AlignmentKind::Added));
                    j -= 1;
                }
                _ if i > 0 => {
                    out.push(one_sided(&left[i - 1], AlignmentKind::Removed));
                    i -= 1;
                }
                _ => {
                    out.push(one_sided(&right[j - 1], AlignmentKind::Added));
                    j -= 1;
                }
            }
        }
        out.reverse();
        out
    }

    /// Kind for a diagonal pair, or `None` when the spans are too dissimilar
    /// to present as one entry.
    fn classify(
        &self,
        similarity: f64,
        left: &CategorizedSpan,
        right: &CategorizedSpan,
    ) -> Option<AlignmentKind> {
        if similarity >= self.config.match_threshold {
            Some(if left.same_content(right) {
                AlignmentKind::Matched
            } else {
                AlignmentKind::Modified
            })
        } else if similarity >= self.config.modified_threshold {
            Some(AlignmentKind::Modified)
        } else {
            None
        }
    }

    fn pair(
        &self,
        kind: AlignmentKind,
        left: &CategorizedSpan,
        right: &CategorizedSpan,
        similarity: f64,
    ) -> AlignedSpanPair {
        AlignedSpanPair {
            kind,
            left_span: Some(left.detached()),
            right_span: Some(right.detached()),
            similarity: Some(similarity),
            children: self.align_level(&left.children, &right.children),
        }
    }
}

fn one_sided(span: &CategorizedSpan, kind: AlignmentKind) -> AlignedSpanPair {
    let (left_span, right_span) = match kind {
        AlignmentKind::Removed => (Some(span.detached()), None),
        _ => (None, Some(span.detached())),
    };
    AlignedSpanPair {
        kind,
        left_span,
        right_span,
        similarity: None,
        children: span.children.iter().map(|c| one_sided(c, kind)).collect(),
    }
}

fn tally(entries: &[AlignedSpanPair], stats: &mut ComparisonStats) {
    let mut stack: Vec<&AlignedSpanPair> = entries.iter().collect();
    while let Some(entry) = stack.pop() {
        match entry.kind {
            AlignmentKind::Matched => stats.matched += 1,
            AlignmentKind::Modified => stats.modified += 1,
            AlignmentKind::Added => stats.added += 1,
            AlignmentKind::Removed => stats.removed += 1,
        }
        stack.extend(&entry.children);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::categorize::categorize;
    use crate::model::span::{AttributeValue, Span, SpanStatus};

    fn cspan(id: &str, name: &str, children: Vec<Span>) -> Span {
        let ts = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        Span {
            span_id: id.to_string(),
            trace_id: "t".to_string(),
            parent_span_id: None,
            name: name.to_string(),
            start_time: ts,
            end_time: ts + Duration::milliseconds(100),
            status: SpanStatus::Ok,
            attributes: Default::default(),
            events: Vec::new(),
            children,
        }
    }

    fn leaf(id: &str, name: &str) -> Span {
        cspan(id, name, Vec::new())
    }

    /// Scores every pair with a fixed value.
    struct FixedScore(f64);

    impl SimilarityScorer for FixedScore {
        fn score(&self, _: &CategorizedSpan, _: &CategorizedSpan) -> f64 {
            self.0
        }
    }

    fn kinds(entries: &[AlignedSpanPair]) -> Vec<AlignmentKind> {
        entries.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn identical_trees_are_all_matched() {
        let tree = vec![categorize(cspan(
            "r",
            "Runner.run",
            vec![leaf("a", "chat"), leaf("b", "execute_tool"), leaf("c", "chat")],
        ))];
        let result = compare_traces(&tree, &tree, None);
        assert_eq!(result.stats.matched, 4);
        assert!(!result.stats.has_changes());
        assert_eq!(result.aligned_tree[0].children.len(), 3);
        assert_eq!(result.aligned_tree[0].similarity, Some(1.0));
    }

    #[test]
    fn empty_sides_produce_one_sided_entries() {
        let tree = vec![categorize(cspan("r", "agent", vec![leaf("a", "chat")]))];

        let added = compare_traces(&[], &tree, None);
        assert_eq!(added.stats.added, 2);
        assert_eq!(added.stats.total_right, 2);
        assert_eq!(kinds(&added.aligned_tree[0].children), vec![AlignmentKind::Added]);
        assert!(added.aligned_tree[0].left_span.is_none());

        let removed = compare_traces(&tree, &[], None);
        assert_eq!(removed.stats.removed, 2);
        assert!(removed.aligned_tree[0].right_span.is_none());

        let none = compare_traces(&[], &[], None);
        assert!(none.aligned_tree.is_empty());
        assert_eq!(none.stats, ComparisonStats::default());
    }

    #[test]
    fn inserted_sibling_is_added_in_place() {
        let left = vec![categorize(cspan(
            "r",
            "agent",
            vec![leaf("a", "chat"), leaf("c", "summarize")],
        ))];
        let right = vec![categorize(cspan(
            "r",
            "agent",
            vec![leaf("a", "chat"), leaf("b", "execute_tool"), leaf("c", "summarize")],
        ))];
        let result = compare_traces(&left, &right, None);
        assert_eq!(
            kinds(&result.aligned_tree[0].children),
            vec![
                AlignmentKind::Matched,
                AlignmentKind::Added,
                AlignmentKind::Matched
            ]
        );
        assert_eq!(result.stats.added, 1);
        assert_eq!(result.stats.matched, 3);
    }

    #[test]
    fn changed_attributes_are_modified() {
        let mut changed = leaf("a", "chat");
        changed
            .attributes
            .insert("temperature".to_string(), AttributeValue::Float(0.7));
        let left = vec![categorize(leaf("a", "chat"))];
        let right = vec![categorize(changed)];
        let result = compare_traces(&left, &right, None);
        assert_eq!(kinds(&result.aligned_tree), vec![AlignmentKind::Modified]);
        assert_eq!(result.stats.modified, 1);
    }

    #[test]
    fn score_at_match_threshold_pairs() {
        let scorer = FixedScore(0.6);
        let aligner = Aligner::new(&scorer, AlignConfig::default());
        let left = vec![categorize(leaf("a", "chat"))];
        let right = vec![categorize(leaf("b", "chat"))];
        let result = aligner.compare(&left, &right);
        assert_eq!(kinds(&result.aligned_tree), vec![AlignmentKind::Matched]);
        assert_eq!(result.aligned_tree[0].similarity, Some(0.6));
    }

    #[test]
    fn score_below_modified_threshold_splits() {
        let scorer = FixedScore(0.39);
        let aligner = Aligner::new(&scorer, AlignConfig::default());
        let left = vec![categorize(leaf("a", "chat"))];
        let right = vec![categorize(leaf("b", "execute_tool"))];
        let result = aligner.compare(&left, &right);
        assert_eq!(
            kinds(&result.aligned_tree),
            vec![AlignmentKind::Removed, AlignmentKind::Added]
        );
        assert_eq!(result.aligned_tree[0].left_span.as_ref().map(|s| s.id()), Some("a"));
        assert_eq!(result.aligned_tree[1].right_span.as_ref().map(|s| s.id()), Some("b"));
    }

    #[test]
    fn low_scores_never_pair_with_default_thresholds() {
        let scorer = FixedScore(0.39);
        let aligner = Aligner::new(&scorer, AlignConfig::default());
        let left = vec![categorize(leaf("a", "chat")), categorize(leaf("c", "chat"))];
        let right = vec![
            categorize(leaf("b", "execute_tool")),
            categorize(leaf("d", "execute_tool")),
        ];
        let result = aligner.compare(&left, &right);
        assert_eq!(result.stats.removed, 2);
        assert_eq!(result.stats.added, 2);
        assert_eq!(result.stats.matched + result.stats.modified, 0);
    }

    #[test]
    fn modified_band_score_still_splits_in_dp() {
        let scorer = FixedScore(0.5);
        let aligner = Aligner::new(&scorer, AlignConfig::default());
        let left = vec![categorize(leaf("a", "chat"))];
        let right = vec![categorize(leaf("b", "chat"))];
        let result = aligner.compare(&left, &right);
        assert_eq!(
            kinds(&result.aligned_tree),
            vec![AlignmentKind::Removed, AlignmentKind::Added]
        );
        assert_eq!(result.stats.modified, 0);
    }

    #[test]
    fn classification_bands() {
        let scorer = FixedScore(0.45);
        let aligner = Aligner::new(&scorer, AlignConfig::default());
        let a = categorize(leaf("a", "chat"));
        let b = categorize(leaf("b", "chat"));
        assert_eq!(
            aligner.classify(0.45, &a, &b),
            Some(AlignmentKind::Modified)
        );
        assert_eq!(aligner.classify(0.39, &a, &b), None);
        assert_eq!(aligner.classify(0.6, &a, &b), Some(AlignmentKind::Matched));
    }

    #[test]
    fn paired_parents_align_children_against_empty() {
        let left = vec![categorize(cspan(
            "r",
            "agent",
            vec![leaf("a", "chat"), leaf("b", "chat")],
        ))];
        let right = vec![categorize(leaf("r", "agent"))];
        let result = compare_traces(&left, &right, None);
        assert_eq!(result.aligned_tree.len(), 1);
        assert_eq!(
            kinds(&result.aligned_tree[0].children),
            vec![AlignmentKind::Removed, AlignmentKind::Removed]
        );
        assert_eq!(result.stats.total_left, 3);
        assert_eq!(result.stats.total_right, 1);
    }

    #[test]
    fn order_is_preserved_without_cross_matching() {
        let left = vec![
            categorize(leaf("x", "chat")),
            categorize(leaf("y", "execute_tool")),
        ];
        let right = vec![
            categorize(leaf("y", "execute_tool")),
            categorize(leaf("x", "chat")),
        ];
        let result = compare_traces(&left, &right, None);
        // A swap cannot be expressed as two matches; one side is dropped.
        assert_eq!(result.stats.matched, 1);
        assert_eq!(result.stats.added, 1);
        assert_eq!(result.stats.removed, 1);
    }
}
