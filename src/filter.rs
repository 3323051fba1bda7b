//! Threshold filtering of links
//!
//! The source link list is never touched; each threshold change derives a fresh
//! subset, so moving the slider back restores every link.

use crate::graph::{Graph, Link};

/// Links with `weight >= threshold`, in their original order
pub fn filter_links(links: &[Link], threshold: f64) -> Vec<Link> {
    links.iter().filter(|l| l.weight >= threshold).cloned().collect()
}

/// A link resolved to node indices, ready for the physics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveLink {
    /// Index into the graph's link list
    pub link: usize,
    pub source: usize,
    pub target: usize,
}

/// Resolve the links passing `threshold` against the graph's node ordering
pub fn active_links(graph: &Graph, threshold: f64) -> Vec<ActiveLink> {
    graph
        .links()
        .iter()
        .enumerate()
        .filter(|(_, l)| l.weight >= threshold)
        .filter_map(|(i, l)| {
            Some(ActiveLink {
                link: i,
                source: graph.index_of(&l.source_id)?,
                target: graph.index_of(&l.target_id)?,
            })
        })
        .collect()
}
