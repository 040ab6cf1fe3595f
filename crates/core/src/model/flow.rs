use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpanDiffError};
use crate::model::category::{CategorizedSpan, Category};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Sequential,
    Parallel,
    Branch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LayoutDirection {
    #[default]
    #[serde(rename = "TB")]
    TopToBottom,
    #[serde(rename = "LR")]
    LeftToRight,
}

impl FromStr for LayoutDirection {
    type Err = SpanDiffError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tb" | "top-to-bottom" | "vertical" => Ok(Self::TopToBottom),
            "lr" | "left-to-right" | "horizontal" => Ok(Self::LeftToRight),
            _ => Err(SpanDiffError::InvalidArgument(format!(
                "unknown layout direction: {s} (expected TB or LR)"
            ))),
        }
    }
}

impl fmt::Display for LayoutDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TopToBottom => f.write_str("TB"),
            Self::LeftToRight => f.write_str("LR"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    pub span: CategorizedSpan,
    /// Wall-clock duration of the whole trace, in milliseconds.
    pub total_duration: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: String,
    pub category: Category,
    pub position: Position,
    pub width: f64,
    pub height: f64,
    pub data: NodeData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
}

impl FlowEdge {
    pub fn new(source: &str, target: &str, kind: EdgeKind) -> Self {
        Self {
            id: format!("{source}->{target}"),
            source: source.to_string(),
            target: target.to_string(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlowGraph {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

impl FlowGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge_between(&self, source: &str, target: &str) -> Option<&FlowEdge> {
        self.edges
            .iter()
            .find(|e| e.source == source && e.target == target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_parse() {
        assert_eq!(
            LayoutDirection::from_str("lr").unwrap(),
            LayoutDirection::LeftToRight
        );
        assert_eq!(
            LayoutDirection::from_str("TB").unwrap(),
            LayoutDirection::TopToBottom
        );
        assert!(LayoutDirection::from_str("diagonal").is_err());
    }

    #[test]
    fn edge_kind_serializes_lowercase() {
        let edge = FlowEdge::new("a", "b", EdgeKind::Parallel);
        let json = serde_json::to_value(&edge).unwrap();
        assert_eq!(json["kind"], "parallel");
        assert_eq!(json["id"], "a->b");
    }
}
