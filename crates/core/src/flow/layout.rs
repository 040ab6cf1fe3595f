//! Layered (Sugiyama-style) layout: longest-path ranking, barycenter
//! crossing reduction, then fixed-pitch coordinates per rank.
//!
//! Edges spanning several ranks are not split into dummy nodes; crossing
//! counts only consider edges between adjacent ranks.

use std::cmp::Ordering;
use std::collections::HashMap;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::config::LayoutConfig;
use crate::model::flow::{EdgeKind, FlowGraph, LayoutDirection, Position};

type Dag = DiGraph<usize, EdgeKind>;

pub fn apply_layout(graph: &mut FlowGraph, config: &LayoutConfig) {
    if graph.nodes.is_empty() {
        return;
    }

    let dag = build_dag(graph);
    let ranks = assign_ranks(&dag);
    let mut layers = group_layers(&dag, &ranks);
    let crossings = order_layers(&dag, &mut layers, config.sweeps);
    tracing::debug!(ranks = layers.len(), crossings, "laid out execution flow");

    let (cross_step, rank_step) = match config.direction {
        LayoutDirection::TopToBottom => (
            config.node_width + config.node_sep,
            config.node_height + config.rank_sep,
        ),
        LayoutDirection::LeftToRight => (
            config.node_height + config.node_sep,
            config.node_width + config.rank_sep,
        ),
    };
    let widest = layers.iter().map(Vec::len).max().unwrap_or(0);

    for (rank, layer) in layers.iter().enumerate() {
        let offset = (widest - layer.len()) as f64 * cross_step / 2.0;
        for (slot, &ix) in layer.iter().enumerate() {
            let cross = offset + slot as f64 * cross_step;
            let main = rank as f64 * rank_step;
            graph.nodes[dag[ix]].position = match config.direction {
                LayoutDirection::TopToBottom => Position { x: cross, y: main },
                LayoutDirection::LeftToRight => Position { x: main, y: cross },
            };
        }
    }
}

/// Graph over node indices. Only edges pointing to a later node are kept,
/// which the transformer guarantees for well-formed traces and which rules
/// out cycles when span ids repeat.
fn build_dag(graph: &FlowGraph) -> Dag {
    let mut dag = Dag::with_capacity(graph.nodes.len(), graph.edges.len());
    let mut index: HashMap<&str, NodeIndex> = HashMap::with_capacity(graph.nodes.len());
    for (i, node) in graph.nodes.iter().enumerate() {
        let ix = dag.add_node(i);
        index.entry(node.id.as_str()).or_insert(ix);
    }
    for edge in &graph.edges {
        if let (Some(&source), Some(&target)) =
            (index.get(edge.source.as_str()), index.get(edge.target.as_str()))
            && source.index() < target.index()
        {
            dag.add_edge(source, target, edge.kind);
        }
    }
    dag
}

/// Longest path from any source.
fn assign_ranks(dag: &Dag) -> Vec<usize> {
    let mut ranks = vec![0; dag.node_count()];
    let order = toposort(dag, None).unwrap_or_else(|_| dag.node_indices().collect());
    for node in order {
        for next in dag.neighbors_directed(node, Direction::Outgoing) {
            ranks[next.index()] = ranks[next.index()].max(ranks[node.index()] + 1);
        }
    }
    ranks
}

fn group_layers(dag: &Dag, ranks: &[usize]) -> Vec<Vec<NodeIndex>> {
    let depth = ranks.iter().copied().max().map_or(0, |r| r + 1);
    let mut layers = vec![Vec::new(); depth];
    for ix in dag.node_indices() {
        layers[ranks[ix.index()]].push(ix);
    }
    layers
}

fn slots(dag: &Dag, layers: &[Vec<NodeIndex>]) -> Vec<f64> {
    let mut slot = vec![0.0; dag.node_count()];
    for layer in layers {
        for (i, ix) in layer.iter().enumerate() {
            slot[ix.index()] = i as f64;
        }
    }
    slot
}

/// Alternating down/up barycenter sweeps, keeping the ordering with the
/// fewest crossings. Returns that crossing count.
fn order_layers(dag: &Dag, layers: &mut Vec<Vec<NodeIndex>>, sweeps: usize) -> usize {
    let mut best = layers.clone();
    let mut best_crossings = count_crossings(dag, layers);

    for sweep in 0..sweeps {
        if best_crossings == 0 {
            break;
        }
        let mut slot = slots(dag, layers);
        let (ranks, direction): (Vec<usize>, _) = if sweep % 2 == 0 {
            ((1..layers.len()).collect(), Direction::Incoming)
        } else {
            ((0..layers.len().saturating_sub(1)).rev().collect(), Direction::Outgoing)
        };

        for rank in ranks {
            let layer = &mut layers[rank];
            let keys: HashMap<NodeIndex, f64> = layer
                .iter()
                .map(|&ix| (ix, barycenter(dag, ix, direction, &slot)))
                .collect();
            layer.sort_by(|a, b| keys[a].partial_cmp(&keys[b]).unwrap_or(Ordering::Equal));
            for (i, ix) in layer.iter().enumerate() {
                slot[ix.index()] = i as f64;
            }
        }

        let crossings = count_crossings(dag, layers);
        if crossings < best_crossings {
            best = layers.clone();
            best_crossings = crossings;
        }
    }

    *layers = best;
    best_crossings
}

fn barycenter(dag: &Dag, ix: NodeIndex, direction: Direction, slot: &[f64]) -> f64 {
    let (sum, count) = dag
        .neighbors_directed(ix, direction)
        .fold((0.0, 0usize), |(sum, count), n| (sum + slot[n.index()], count + 1));
    if count == 0 {
        slot[ix.index()]
    } else {
        sum / count as f64
    }
}

/// Crossings between edges joining adjacent ranks.
fn count_crossings(dag: &Dag, layers: &[Vec<NodeIndex>]) -> usize {
    let slot = slots(dag, layers);
    let mut rank_of = vec![0; dag.node_count()];
    for (rank, layer) in layers.iter().enumerate() {
        for ix in layer {
            rank_of[ix.index()] = rank;
        }
    }

    let mut by_rank: Vec<Vec<(f64, f64)>> = vec![Vec::new(); layers.len()];
    for edge in dag.edge_indices() {
        if let Some((a, b)) = dag.edge_endpoints(edge)
            && rank_of[b.index()] == rank_of[a.index()] + 1
        {
            by_rank[rank_of[a.index()]].push((slot[a.index()], slot[b.index()]));
        }
    }

    by_rank
        .iter()
        .map(|edges| {
            let mut crossings = 0;
            for (i, &(a1, b1)) in edges.iter().enumerate() {
                for &(a2, b2) in &edges[i + 1..] {
                    if (a1 < a2 && b1 > b2) || (a1 > a2 && b1 < b2) {
                        crossings += 1;
                    }
                }
            }
            crossings
        })
        .sum()
}
