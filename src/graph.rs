//! Graph model
//!
//! Turns relationship records into a node set and a link list, and assigns each
//! stock a group (its most common relationship type) for colouring.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use tracing::warn;

use crate::dataset::RelationRecord;

/// A stock in the network
///
/// Positions and velocities are only written by the integrator; the pin
/// coordinates are only written by the interaction controller.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Unique stock symbol
    pub id: String,
    /// Most common relationship type touching this stock
    pub group: Option<String>,
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) vx: f64,
    pub(crate) vy: f64,
    pub(crate) fx: Option<f64>,
    pub(crate) fy: Option<f64>,
}

impl Node {
    /// Create an unplaced, unpinned node
    pub fn new(id: impl Into<String>, group: Option<String>) -> Self {
        Self {
            id: id.into(),
            group,
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            fx: None,
            fy: None,
        }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn vx(&self) -> f64 {
        self.vx
    }

    pub fn vy(&self) -> f64 {
        self.vy
    }

    /// Pin coordinate, if the node is pinned
    pub fn pinned_at(&self) -> Option<(f64, f64)> {
        self.fx.zip(self.fy)
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned_at().is_some()
    }
}

/// A weighted relationship between two stocks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub source_id: String,
    pub target_id: String,
    pub weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation_type: Option<String>,
}

/// Nodes keyed by id (in first-seen order) plus the ordered link list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    pub(crate) nodes: IndexMap<String, Node>,
    pub(crate) links: Vec<Link>,
}

impl Graph {
    /// Assemble a graph from existing nodes and links
    ///
    /// Duplicate node ids keep their first occurrence. Links whose endpoints are not
    /// in the node set are dropped; the number dropped is returned alongside.
    pub fn from_parts(
        nodes: impl IntoIterator<Item = Node>,
        links: impl IntoIterator<Item = Link>,
    ) -> (Self, usize) {
        let mut map = IndexMap::new();
        for node in nodes {
            map.entry(node.id.clone()).or_insert(node);
        }

        let mut dropped = 0;
        let links = links
            .into_iter()
            .filter(|l| {
                let known = map.contains_key(&l.source_id) && map.contains_key(&l.target_id);
                if !known {
                    dropped += 1;
                }
                known
            })
            .collect();

        if dropped > 0 {
            warn!(dropped, "dropped links with unknown endpoints");
        }
        (Self { nodes: map, links }, dropped)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Position of a node id in the node ordering
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.nodes.get_index_of(id)
    }

    /// Distinct node groups in first-seen node order
    pub fn groups(&self) -> Vec<String> {
        let groups: IndexSet<&String> = self.nodes.values().filter_map(|n| n.group.as_ref()).collect();
        groups.into_iter().cloned().collect()
    }
}

/// Result of building a graph from records
#[derive(Debug, Clone)]
pub struct GraphBuild {
    pub graph: Graph,
    /// Distinct group labels in first-seen order (legend order)
    pub groups: Vec<String>,
    /// Records dropped because a stock id was missing
    pub dropped_records: usize,
}

/// Build the network from relationship records
pub fn build(records: &[RelationRecord]) -> GraphBuild {
    let mut dropped_records = 0;
    let mut ids: IndexSet<&str> = IndexSet::new();
    let mut links = Vec::new();

    for record in records {
        let (Some(source), Some(target)) = (record.stock1.as_deref(), record.stock2.as_deref())
        else {
            dropped_records += 1;
            continue;
        };
        ids.insert(source);
        ids.insert(target);
        links.push(Link {
            source_id: source.to_string(),
            target_id: target.to_string(),
            weight: record.weight,
            relation_type: record.relation_type.clone(),
        });
    }

    if dropped_records > 0 {
        warn!(dropped_records, "dropped records with a missing stock id");
    }

    let assignments = assign_groups(&ids, &links);
    let nodes = ids
        .iter()
        .zip(assignments)
        .map(|(id, group)| Node::new(*id, group));
    let (graph, _) = Graph::from_parts(nodes, links);
    let groups = graph.groups();

    GraphBuild {
        graph,
        groups,
        dropped_records,
    }
}

/// Pick each node's most frequent relation type
///
/// Ties go to the type that appeared first in the input.
fn assign_groups(ids: &IndexSet<&str>, links: &[Link]) -> Vec<Option<String>> {
    let types: IndexSet<&str> = links.iter().filter_map(|l| l.relation_type.as_deref()).collect();
    let mut counts = vec![vec![0usize; types.len()]; ids.len()];

    for link in links {
        let Some(kind) = link.relation_type.as_deref().and_then(|t| types.get_index_of(t)) else {
            continue;
        };
        let source = ids.get_index_of(link.source_id.as_str());
        let target = ids.get_index_of(link.target_id.as_str());
        if let Some(s) = source {
            counts[s][kind] += 1;
        }
        if let Some(t) = target.filter(|t| Some(*t) != source) {
            counts[t][kind] += 1;
        }
    }

    counts
        .iter()
        .map(|per_type| {
            let mut best: Option<(usize, usize)> = None;
            for (kind, &count) in per_type.iter().enumerate() {
                if count > 0 && best.is_none_or(|(_, c)| count > c) {
                    best = Some((kind, count));
                }
            }
            best.and_then(|(kind, _)| types.get_index(kind).map(|t| t.to_string()))
        })
        .collect()
}
