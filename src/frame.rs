//! Render-facing output
//!
//! A [`Frame`] is emitted after every tick; the [`Palette`] is built once per
//! dataset so group colours stay stable while the layout moves.

use indexmap::IndexMap;
use serde::Serialize;

use crate::filter::ActiveLink;
use crate::graph::Graph;

/// Ten-colour categorical scheme, assigned to groups in first-seen order
pub const CATEGORY10: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// Colour for nodes without a group and for dimmed nodes
pub const UNGROUPED_COLOR: &str = "#999999";

/// Stable group to colour assignment
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Palette {
    colors: IndexMap<String, &'static str>,
}

impl Palette {
    /// Assign colours to `groups` in order, cycling the scheme if needed
    pub fn new(groups: &[String]) -> Self {
        let colors = groups
            .iter()
            .zip(CATEGORY10.iter().cycle())
            .map(|(g, c)| (g.clone(), *c))
            .collect();
        Self { colors }
    }

    /// Colour for a node's group
    pub fn color(&self, group: Option<&str>) -> &'static str {
        group
            .and_then(|g| self.colors.get(g).copied())
            .unwrap_or(UNGROUPED_COLOR)
    }

    /// Groups in legend order
    pub fn groups(&self) -> impl Iterator<Item = (&str, &'static str)> {
        self.colors.iter().map(|(g, c)| (g.as_str(), *c))
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

/// A positioned node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameNode {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub group: Option<String>,
    /// False when another group is selected
    pub highlighted: bool,
}

/// An active link
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameLink {
    pub source_id: String,
    pub target_id: String,
    pub weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation_type: Option<String>,
}

/// Everything the renderer needs for one tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub nodes: Vec<FrameNode>,
    pub links: Vec<FrameLink>,
    pub alpha: f64,
}

impl Frame {
    /// Capture the graph's current positions and active links
    pub fn capture(graph: &Graph, active: &[ActiveLink], alpha: f64, selected: Option<&str>) -> Self {
        let nodes = graph
            .nodes()
            .map(|n| FrameNode {
                id: n.id.clone(),
                x: n.x(),
                y: n.y(),
                group: n.group.clone(),
                highlighted: selected.is_none_or(|s| n.group.as_deref() == Some(s)),
            })
            .collect();
        let links = active
            .iter()
            .filter_map(|a| graph.links().get(a.link))
            .map(|l| FrameLink {
                source_id: l.source_id.clone(),
                target_id: l.target_id.clone(),
                weight: l.weight,
                relation_type: l.relation_type.clone(),
            })
            .collect();
        Self { nodes, links, alpha }
    }

    pub fn node(&self, id: &str) -> Option<&FrameNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}
