mod output;
mod telemetry;

use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use spandiff_core::align::Aligner;
use spandiff_core::align::similarity::{SpanSimilarity, ToolSimilarityConfig};
use spandiff_core::categorize::categorize_tree;
use spandiff_core::config::Config;
use spandiff_core::flow::build_flow;
use spandiff_core::model::category::CategorizedSpan;
use spandiff_core::model::flow::LayoutDirection;
use spandiff_core::model::span::Span;
use spandiff_core::stats::{
    CategoryBreakdown, ToolUsage, TraceSummary, category_breakdown, summarize, tool_usage,
};
use spandiff_core::tree::{build_trees, find_span, group_by_trace, trace_duration_ms};
use spandiff_ingest::{InputFormat, load_spans};

use crate::output::{print_comparison_human, print_flow_human, print_stats_human, print_tree_human};
use crate::telemetry::{LogFormat, init_cli_tracing};

#[derive(Parser, Debug)]
#[command(name = "spandiff")]
#[command(about = "Execution flows and structural diffs for AI agent traces")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true, default_value = "json", help = "Input format: json or otlp")]
    format: InputFormat,

    #[arg(long, global = true, help = "Trace id to use when the input holds several")]
    trace: Option<String>,

    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Build the laid-out execution flow graph of a trace")]
    Flow {
        #[arg(help = "Span file, or - for stdin")]
        file: PathBuf,
        #[arg(long, help = "Layout direction: tb or lr")]
        direction: Option<LayoutDirection>,
    },
    #[command(about = "Align two traces and report matched, modified, added and removed spans")]
    Compare {
        left: PathBuf,
        right: PathBuf,
        #[arg(long, help = "TOML file with per-tool key arguments")]
        tool_config: Option<PathBuf>,
    },
    #[command(about = "Summarize categories, tool usage and tokens of a trace")]
    Stats { file: PathBuf },
    #[command(about = "Print the categorized span tree")]
    Tree {
        file: PathBuf,
        #[arg(long, help = "Only print the subtree under this span id")]
        root: Option<String>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsReport {
    trace_id: String,
    summary: TraceSummary,
    categories: Vec<CategoryBreakdown>,
    tools: Vec<ToolUsage>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_cli_tracing(LogFormat::from_env());

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let color = std::io::stdout().is_terminal();

    match &cli.command {
        Commands::Flow { file, direction } => {
            if let Some(direction) = direction {
                config.layout.direction = *direction;
            }
            let (_, roots) = load_trace(file, &cli)?;
            let total = trace_duration_ms(&roots);
            let graph = build_flow(&roots, total, &config);
            if cli.json {
                print_json(&graph)?;
            } else {
                print_flow_human(&graph, color);
            }
        }
        Commands::Compare {
            left,
            right,
            tool_config,
        } => {
            let tools = match tool_config {
                Some(path) => ToolSimilarityConfig::load(path)?,
                None => config.tools.clone(),
            };
            let (_, left_roots) = load_trace(left, &cli)?;
            let (_, right_roots) = load_trace(right, &cli)?;
            let scorer = SpanSimilarity::new(Some(&tools));
            let result = Aligner::new(&scorer, config.align.clone()).compare(&left_roots, &right_roots);
            if cli.json {
                print_json(&result)?;
            } else {
                print_comparison_human(&result, color);
            }
        }
        Commands::Stats { file } => {
            let (trace_id, roots) = load_trace(file, &cli)?;
            let report = StatsReport {
                trace_id,
                summary: summarize(&roots),
                categories: category_breakdown(&roots),
                tools: tool_usage(&roots),
            };
            if cli.json {
                print_json(&report)?;
            } else {
                print_stats_human(&report.trace_id, &report.summary, &report.categories, &report.tools);
            }
        }
        Commands::Tree { file, root } => {
            let (_, roots) = load_trace(file, &cli)?;
            let selected = match root {
                Some(id) => {
                    let Some(found) = find_span(&roots, id) else {
                        bail!("span not found: {id}");
                    };
                    std::slice::from_ref(found)
                }
                None => roots.as_slice(),
            };
            if cli.json {
                print_json(&selected)?;
            } else {
                print_tree_human(selected, color);
            }
        }
    }

    Ok(())
}

/// Reads one trace from `path` and returns its id with the categorized forest.
fn load_trace(path: &Path, cli: &Cli) -> anyhow::Result<(String, Vec<CategorizedSpan>)> {
    let payload = read_input(path)?;
    let spans = load_spans(&payload, cli.format)
        .with_context(|| format!("failed to decode {}", path.display()))?;
    let (trace_id, spans) = select_trace(spans, cli.trace.as_deref())?;
    tracing::debug!(trace_id = %trace_id, spans = spans.len(), "selected trace");
    Ok((trace_id, categorize_tree(build_trees(&spans))))
}

fn read_input(path: &Path) -> anyhow::Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn select_trace(spans: Vec<Span>, wanted: Option<&str>) -> anyhow::Result<(String, Vec<Span>)> {
    let mut traces = group_by_trace(spans);
    if let Some(id) = wanted {
        return match traces.remove(id) {
            Some(spans) => Ok((id.to_string(), spans)),
            None => bail!("trace not found in input: {id}"),
        };
    }
    if traces.len() > 1 {
        let ids = traces.keys().cloned().collect::<Vec<_>>().join(", ");
        bail!("input holds {} traces ({ids}); pick one with --trace", traces.len());
    }
    Ok(traces.pop_first().unwrap_or_default())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
