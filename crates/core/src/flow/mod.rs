//! Execution-order graph for a single trace.
//!
//! Sibling spans become a chain of `sequential` / `parallel` edges in start
//! order; nesting is shown by one `branch` edge from a parent to its earliest
//! child. Container spans (agent invocations wrapping the whole run) are
//! replaced by their children.

pub mod layout;

use std::collections::VecDeque;

use crate::config::{Config, FlowConfig, LayoutConfig};
use crate::model::category::CategorizedSpan;
use crate::model::flow::{EdgeKind, FlowEdge, FlowGraph, FlowNode, NodeData, Position};
use crate::semconv;
use crate::time::to_delta;

const CONTAINER_NAME_PATTERNS: &[&str] = &[
    "invoke_agent",
    "invoke agent",
    "create_agent",
    "agent.run",
    "agent run",
    "agent_run",
    "run_agent",
    "runner.run",
];

/// Builds and lays out the flow graph for a categorized forest.
pub fn build_flow(
    roots: &[CategorizedSpan],
    total_duration_ms: i64,
    config: &Config,
) -> FlowGraph {
    let mut graph = transform(roots, total_duration_ms, &config.flow, &config.layout);
    layout::apply_layout(&mut graph, &config.layout);
    graph
}

/// Whether `span` is a synthetic wrapper that should not become a node.
pub fn is_container(span: &CategorizedSpan, is_root: bool, config: &FlowConfig) -> bool {
    if matches!(
        span.span.attr_str(semconv::OPERATION_NAME),
        Some(semconv::OP_INVOKE_AGENT | semconv::OP_CREATE_AGENT)
    ) {
        return true;
    }

    let lowered = span.span.name.to_ascii_lowercase();
    if CONTAINER_NAME_PATTERNS.iter().any(|p| lowered.contains(p)) {
        return true;
    }

    is_root && covers_children(span, config)
}

/// A root with at least two children whose lifetime spans nearly all of the
/// children's combined window.
fn covers_children(span: &CategorizedSpan, config: &FlowConfig) -> bool {
    if span.children.len() < 2 {
        return false;
    }
    let Some(first_start) = span.children.iter().map(|c| c.span.start_time).min() else {
        return false;
    };
    let Some(last_end) = span.children.iter().map(|c| c.span.end_time).max() else {
        return false;
    };

    // A tolerance too large to add means any start qualifies.
    if let Some(latest_start) =
        first_start.checked_add_signed(to_delta(config.container_start_tolerance))
        && span.span.start_time > latest_start
    {
        return false;
    }
    let window_ms = (last_end - first_start).num_milliseconds();
    if window_ms <= 0 {
        return true;
    }
    span.duration_ms() as f64 >= config.container_coverage * window_ms as f64
}

/// Replaces nested containers by their children, then orders by start.
fn elide_containers<'a>(
    spans: impl DoubleEndedIterator<Item = &'a CategorizedSpan>,
    config: &FlowConfig,
) -> Vec<&'a CategorizedSpan> {
    let mut out = Vec::new();
    let mut stack: Vec<&CategorizedSpan> = spans.rev().collect();
    while let Some(span) = stack.pop() {
        if is_container(span, false, config) {
            stack.extend(span.children.iter().rev());
        } else {
            out.push(span);
        }
    }
    out.sort_by_key(|s| s.span.start_time);
    out
}

/// Nodes and edges without positions.
pub fn transform(
    roots: &[CategorizedSpan],
    total_duration_ms: i64,
    flow: &FlowConfig,
    layout: &LayoutConfig,
) -> FlowGraph {
    let mut graph = FlowGraph::default();
    let jitter = to_delta(flow.parallel_jitter);

    // The coverage rule only applies to a lone root; in multi-root traces
    // every root stays on the top level unless it is an agent wrapper.
    let top = match roots {
        [root] if is_container(root, true, flow) => {
            elide_containers(root.children.iter(), flow)
        }
        _ => elide_containers(roots.iter(), flow),
    };

    let mut levels: VecDeque<Vec<&CategorizedSpan>> = VecDeque::new();
    if !top.is_empty() {
        levels.push_back(top);
    }

    while let Some(level) = levels.pop_front() {
        for span in &level {
            graph.nodes.push(FlowNode {
                id: span.id().to_string(),
                category: span.category,
                position: Position::default(),
                width: layout.node_width,
                height: layout.node_height,
                data: NodeData {
                    span: span.detached(),
                    total_duration: total_duration_ms,
                },
            });
        }

        for pair in level.windows(2) {
            let (current, next) = (pair[0], pair[1]);
            // A jitter reaching past the representable range swallows any overlap.
            let parallel = current
                .span
                .end_time
                .checked_sub_signed(jitter)
                .is_some_and(|cutoff| next.span.start_time < cutoff);
            let kind = if parallel {
                EdgeKind::Parallel
            } else {
                EdgeKind::Sequential
            };
            graph.edges.push(FlowEdge::new(current.id(), next.id(), kind));
        }

        for span in &level {
            let children = elide_containers(span.children.iter(), flow);
            if let Some(first) = children.first() {
                graph
                    .edges
                    .push(FlowEdge::new(span.id(), first.id(), EdgeKind::Branch));
                levels.push_back(children);
            }
        }
    }

    tracing::debug!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "built execution flow"
    );
    graph
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::categorize::categorize;
    use crate::model::span::{AttributeValue, Span, SpanStatus};

    fn span(id: &str, name: &str, start_ms: i64, end_ms: i64, children: Vec<Span>) -> Span {
        let base = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        Span {
            span_id: id.to_string(),
            trace_id: "t".to_string(),
            parent_span_id: None,
            name: name.to_string(),
            start_time: base + Duration::milliseconds(start_ms),
            end_time: base + Duration::milliseconds(end_ms),
            status: SpanStatus::Ok,
            attributes: Default::default(),
            events: Vec::new(),
            children,
        }
    }

    fn flow(roots: Vec<Span>) -> FlowGraph {
        let roots = roots.into_iter().map(categorize).collect::<Vec<_>>();
        build_flow(&roots, 0, &Config::default())
    }

    fn edge_kind(graph: &FlowGraph, source: &str, target: &str) -> Option<EdgeKind> {
        graph.edge_between(source, target).map(|e| e.kind)
    }

    #[test]
    fn empty_forest_gives_empty_graph() {
        let graph = flow(Vec::new());
        assert!(graph.nodes.is_empty());
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn overlapping_siblings_are_parallel() {
        let graph = flow(vec![span(
            "p",
            "GET /orders",
            0,
            5000,
            vec![span("1", "a", 0, 2000, vec![]), span("2", "b", 1000, 3000, vec![])],
        )]);
        assert_eq!(edge_kind(&graph, "1", "2"), Some(EdgeKind::Parallel));
    }

    #[test]
    fn oversized_tolerances_do_not_overflow() {
        let ages = std::time::Duration::from_secs(300_000 * 365 * 24 * 3600);
        let mut config = Config::default();
        config.flow.parallel_jitter = ages;
        config.flow.container_start_tolerance = ages;
        config.validate().unwrap();

        let roots = vec![categorize(span(
            "p",
            "GET /orders",
            0,
            5000,
            vec![
                span("1", "a", 0, 2000, vec![]),
                span("2", "b", 1000, 3000, vec![]),
                span("3", "c", 3500, 4000, vec![]),
            ],
        ))];
        let graph = build_flow(&roots, 5000, &config);
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(edge_kind(&graph, "1", "2"), Some(EdgeKind::Sequential));
        assert_eq!(edge_kind(&graph, "2", "3"), Some(EdgeKind::Sequential));
    }

    #[test]
    fn gap_beyond_jitter_is_sequential() {
        let graph = flow(vec![span(
            "p",
            "GET /orders",
            0,
            5000,
            vec![span("1", "a", 0, 1000, vec![]), span("2", "b", 1100, 2000, vec![])],
        )]);
        assert_eq!(edge_kind(&graph, "1", "2"), Some(EdgeKind::Sequential));
    }

    #[test]
    fn overlap_within_jitter_is_sequential() {
        let graph = flow(vec![span(
            "p",
            "GET /orders",
            0,
            5000,
            vec![span("1", "a", 0, 1000, vec![]), span("2", "b", 995, 2000, vec![])],
        )]);
        assert_eq!(edge_kind(&graph, "1", "2"), Some(EdgeKind::Sequential));
    }

    #[test]
    fn invoke_agent_root_is_elided() {
        let mut root = span(
            "root",
            "planner",
            0,
            3000,
            vec![
                span("a", "chat", 0, 900, vec![]),
                span("b", "execute_tool", 1000, 1500, vec![]),
                span("c", "chat", 1400, 2900, vec![]),
            ],
        );
        root.attributes.insert(
            semconv::OPERATION_NAME.to_string(),
            AttributeValue::from(semconv::OP_INVOKE_AGENT),
        );
        let graph = flow(vec![root]);

        assert_eq!(graph.nodes.len(), 3);
        assert!(graph.node("root").is_none());
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(edge_kind(&graph, "a", "b"), Some(EdgeKind::Sequential));
        assert_eq!(edge_kind(&graph, "b", "c"), Some(EdgeKind::Parallel));
    }

    #[test]
    fn covering_root_is_container_but_short_root_is_not() {
        let cfg = FlowConfig::default();
        let covering = categorize(span(
            "r",
            "handle request",
            0,
            1000,
            vec![span("a", "x", 0, 400, vec![]), span("b", "y", 500, 1000, vec![])],
        ));
        assert!(is_container(&covering, true, &cfg));
        assert!(!is_container(&covering, false, &cfg));

        let short = categorize(span(
            "r",
            "handle request",
            0,
            500,
            vec![span("a", "x", 0, 400, vec![]), span("b", "y", 500, 1000, vec![])],
        ));
        assert!(!is_container(&short, true, &cfg));

        let single = categorize(span(
            "r",
            "handle",
            0,
            1000,
            vec![span("a", "x", 0, 1000, vec![])],
        ));
        assert!(!is_container(&single, true, &cfg));
    }

    #[test]
    fn late_starting_root_is_not_container() {
        let cfg = FlowConfig::default();
        let late = categorize(span(
            "r",
            "handle request",
            300,
            1000,
            vec![span("a", "x", 0, 400, vec![]), span("b", "y", 500, 700, vec![])],
        ));
        assert!(!is_container(&late, true, &cfg));
    }

    #[test]
    fn nesting_gets_one_branch_edge_to_first_child() {
        let graph = flow(vec![
            span(
                "a",
                "step one",
                0,
                1000,
                vec![
                    span("a2", "x", 600, 900, vec![]),
                    span("a1", "y", 100, 500, vec![]),
                ],
            ),
            span("b", "step two", 2000, 3000, vec![]),
        ]);
        assert_eq!(graph.nodes.len(), 4);
        assert_eq!(edge_kind(&graph, "a", "b"), Some(EdgeKind::Sequential));
        assert_eq!(edge_kind(&graph, "a", "a1"), Some(EdgeKind::Branch));
        assert!(graph.edge_between("a", "a2").is_none());
        assert_eq!(edge_kind(&graph, "a1", "a2"), Some(EdgeKind::Sequential));
        let branches = graph
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Branch)
            .count();
        assert_eq!(branches, 1);
    }

    #[test]
    fn nested_container_is_spliced_into_level() {
        let graph = flow(vec![
            span("a", "step one", 0, 1000, vec![]),
            span(
                "wrap",
                "Agent run",
                1000,
                3000,
                vec![
                    span("w1", "chat", 1100, 1500, vec![]),
                    span("w2", "execute_tool", 1600, 2000, vec![]),
                ],
            ),
        ]);
        assert!(graph.node("wrap").is_none());
        assert_eq!(edge_kind(&graph, "a", "w1"), Some(EdgeKind::Sequential));
        assert_eq!(edge_kind(&graph, "w1", "w2"), Some(EdgeKind::Sequential));
    }

    #[test]
    fn nodes_carry_span_and_trace_duration() {
        let roots = vec![categorize(span("a", "chat", 0, 100, vec![]))];
        let graph = build_flow(&roots, 4200, &Config::default());
        let node = graph.node("a").unwrap();
        assert_eq!(node.data.total_duration, 4200);
        assert_eq!(node.data.span.display_name, "chat");
        assert_eq!(node.width, 220.0);
    }
}
