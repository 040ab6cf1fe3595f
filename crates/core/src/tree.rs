use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::model::category::CategorizedSpan;
use crate::model::span::Span;

/// Ordered-forest access shared by raw and categorized trees.
pub trait SpanTree: Sized {
    fn span(&self) -> &Span;
    fn child_nodes(&self) -> &[Self];
}

impl SpanTree for Span {
    fn span(&self) -> &Span {
        self
    }

    fn child_nodes(&self) -> &[Self] {
        &self.children
    }
}

impl SpanTree for CategorizedSpan {
    fn span(&self) -> &Span {
        &self.span
    }

    fn child_nodes(&self) -> &[Self] {
        &self.children
    }
}

/// Partitions a mixed span list by trace id.
pub fn group_by_trace(spans: Vec<Span>) -> BTreeMap<String, Vec<Span>> {
    let mut out: BTreeMap<String, Vec<Span>> = BTreeMap::new();
    for span in spans {
        out.entry(span.trace_id.clone()).or_default().push(span);
    }
    out
}

/// Links a flat span list into chronologically ordered trees.
///
/// Spans whose parent id does not resolve become roots. Children and roots
/// are ordered by start time (stable for equal starts). Duplicate span ids
/// are not merged: children attach to the last span carrying the id.
pub fn build_trees(spans: &[Span]) -> Vec<Span> {
    if spans.is_empty() {
        return Vec::new();
    }

    let mut index: HashMap<&str, usize> = HashMap::with_capacity(spans.len());
    for (i, span) in spans.iter().enumerate() {
        index.insert(span.span_id.as_str(), i);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); spans.len()];
    let mut roots = Vec::new();
    for (i, span) in spans.iter().enumerate() {
        match span
            .parent_span_id
            .as_deref()
            .and_then(|p| index.get(p).copied())
            .filter(|&p| p != i)
        {
            Some(parent) => children[parent].push(i),
            None => roots.push(i),
        }
    }

    let by_start = |ids: &mut Vec<usize>| ids.sort_by_key(|&i| (spans[i].start_time, i));
    for kids in &mut children {
        by_start(kids);
    }

    // Preorder over the linked structure. Anything unreached sits on a parent
    // cycle; promote its earliest member to a root and continue.
    let mut visited = vec![false; spans.len()];
    let mut order = Vec::with_capacity(spans.len());
    visit_from(&roots, &children, &mut visited, &mut order);
    while order.len() < spans.len() {
        let Some(orphan) = (0..spans.len())
            .filter(|&i| !visited[i])
            .min_by_key(|&i| (spans[i].start_time, i))
        else {
            break;
        };
        tracing::debug!(span_id = %spans[orphan].span_id, "breaking parent cycle");
        for kids in &mut children {
            kids.retain(|&k| k != orphan);
        }
        roots.push(orphan);
        visit_from(&[orphan], &children, &mut visited, &mut order);
    }
    by_start(&mut roots);

    // Children appear after their parent in preorder, so building in reverse
    // preorder always finds finished subtrees.
    let mut built: Vec<Option<Span>> = vec![None; spans.len()];
    for &i in order.iter().rev() {
        let mut span = spans[i].detached();
        span.children = children[i]
            .iter()
            .filter_map(|&k| built[k].take())
            .collect();
        built[i] = Some(span);
    }

    roots.iter().filter_map(|&i| built[i].take()).collect()
}

fn visit_from(
    starts: &[usize],
    children: &[Vec<usize>],
    visited: &mut [bool],
    order: &mut Vec<usize>,
) {
    let mut stack: Vec<usize> = starts.iter().rev().copied().collect();
    while let Some(i) = stack.pop() {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        order.push(i);
        stack.extend(children[i].iter().rev().copied());
    }
}

/// Preorder listing of every node in the forest.
pub fn flatten<T: SpanTree>(roots: &[T]) -> Vec<&T> {
    let mut out = Vec::new();
    let mut stack: Vec<&T> = roots.iter().rev().collect();
    while let Some(node) = stack.pop() {
        out.push(node);
        stack.extend(node.child_nodes().iter().rev());
    }
    out
}

pub fn count_spans<T: SpanTree>(roots: &[T]) -> usize {
    let mut count = 0;
    let mut stack: Vec<&T> = roots.iter().collect();
    while let Some(node) = stack.pop() {
        count += 1;
        stack.extend(node.child_nodes());
    }
    count
}

pub fn find_span<'a, T: SpanTree>(roots: &'a [T], span_id: &str) -> Option<&'a T> {
    let mut stack: Vec<&T> = roots.iter().collect();
    while let Some(node) = stack.pop() {
        if node.span().span_id == span_id {
            return Some(node);
        }
        stack.extend(node.child_nodes());
    }
    None
}

/// Earliest start and latest end across the forest.
pub fn time_bounds<T: SpanTree>(roots: &[T]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    flatten(roots).into_iter().fold(None, |acc, node| {
        let span = node.span();
        Some(match acc {
            None => (span.start_time, span.end_time),
            Some((start, end)) => (start.min(span.start_time), end.max(span.end_time)),
        })
    })
}

/// Wall-clock duration of the forest in milliseconds, zero when empty.
pub fn trace_duration_ms<T: SpanTree>(roots: &[T]) -> i64 {
    time_bounds(roots)
        .map(|(start, end)| (end - start).num_milliseconds().max(0))
        .unwrap_or(0)
}
