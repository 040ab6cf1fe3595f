use owo_colors::OwoColorize;
use spandiff_core::model::category::{CategorizedSpan, Category};
use spandiff_core::model::diff::{AlignedSpanPair, AlignmentKind, TraceComparisonResult};
use spandiff_core::model::flow::{EdgeKind, FlowGraph};
use spandiff_core::stats::{CategoryBreakdown, ToolUsage, TraceSummary};

pub fn print_flow_human(graph: &FlowGraph, color: bool) {
    for node in &graph.nodes {
        println!(
            "{} {} ({}ms) at ({:.0},{:.0}) id={}",
            category_tag(node.category, color),
            node.data.span.display_name,
            node.data.span.duration_ms(),
            node.position.x,
            node.position.y,
            node.id
        );
    }
    for edge in &graph.edges {
        let arrow = match edge.kind {
            EdgeKind::Sequential => "-->",
            EdgeKind::Parallel => "==>",
            EdgeKind::Branch => "-+>",
        };
        println!("{} {arrow} {} [{:?}]", edge.source, edge.target, edge.kind);
    }
    println!(
        "-- {} nodes, {} edges --",
        graph.nodes.len(),
        graph.edges.len()
    );
}

pub fn print_comparison_human(result: &TraceComparisonResult, color: bool) {
    let mut stack: Vec<(&AlignedSpanPair, usize)> =
        result.aligned_tree.iter().rev().map(|p| (p, 0)).collect();
    while let Some((pair, depth)) = stack.pop() {
        print_pair(pair, depth, color);
        stack.extend(pair.children.iter().rev().map(|c| (c, depth + 1)));
    }

    let s = &result.stats;
    println!(
        "-- left={} right={} matched={} modified={} added={} removed={} --",
        s.total_left, s.total_right, s.matched, s.modified, s.added, s.removed
    );
    if !s.has_changes() {
        println!("traces are structurally identical");
    }
}

fn print_pair(pair: &AlignedSpanPair, depth: usize, color: bool) {
    let Some(span) = pair.primary_span() else {
        return;
    };
    let indent = "  ".repeat(depth);
    let similarity = pair
        .similarity
        .map(|s| format!(" sim={s:.2}"))
        .unwrap_or_default();
    let line = format!(
        "{} {indent}{} ({}ms){similarity}",
        marker(pair.kind),
        span.display_name,
        span.duration_ms()
    );

    if !color {
        println!("{line}");
        return;
    }
    match pair.kind {
        AlignmentKind::Matched => println!("{line}"),
        AlignmentKind::Modified => println!("{}", line.yellow()),
        AlignmentKind::Added => println!("{}", line.green()),
        AlignmentKind::Removed => println!("{}", line.red()),
    }
}

fn marker(kind: AlignmentKind) -> char {
    match kind {
        AlignmentKind::Matched => ' ',
        AlignmentKind::Modified => '~',
        AlignmentKind::Added => '+',
        AlignmentKind::Removed => '-',
    }
}

pub fn print_stats_human(
    trace_id: &str,
    summary: &TraceSummary,
    categories: &[CategoryBreakdown],
    tools: &[ToolUsage],
) {
    println!(
        "TRACE {} duration={}ms spans={} roots={} errors={}",
        trace_id, summary.duration_ms, summary.span_count, summary.root_count, summary.error_count
    );
    println!(
        "tokens input={} output={} total={}",
        summary.tokens.input_tokens,
        summary.tokens.output_tokens,
        summary.tokens.total()
    );
    for c in categories {
        println!(
            "category={} count={} duration={}ms share={:.1}%",
            c.label, c.count, c.duration_ms, c.percentage
        );
    }
    for t in tools {
        println!(
            "tool={} calls={} total={}ms avg={}ms",
            t.tool_name,
            t.count,
            t.total_duration_ms,
            t.avg_duration_ms()
        );
    }
    println!("-- {} tools --", tools.len());
}

pub fn print_tree_human(roots: &[CategorizedSpan], color: bool) {
    let mut stack: Vec<(&CategorizedSpan, usize)> = roots.iter().rev().map(|r| (r, 0)).collect();
    while let Some((node, depth)) = stack.pop() {
        let indent = "  ".repeat(depth);
        println!(
            "{indent}{} {} ({}ms) {}",
            category_tag(node.category, color),
            node.display_name,
            node.duration_ms(),
            node.span.status
        );
        stack.extend(node.children.iter().rev().map(|c| (c, depth + 1)));
    }
}

fn category_tag(category: Category, color: bool) -> String {
    let tag = format!("[{}]", category.label());
    if !color {
        return tag;
    }
    match category {
        Category::Agent => tag.magenta().to_string(),
        Category::Llm => tag.blue().to_string(),
        Category::Tool => tag.cyan().to_string(),
        Category::Error => tag.red().to_string(),
        Category::Other => tag.bright_black().to_string(),
    }
}
