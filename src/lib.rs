//! stocknet - force-directed layout for stock relationship networks.
//!
//! Relationship records are turned into a graph, filtered by weight, and laid out
//! by a Barnes-Hut accelerated force simulation that can be pinned, dragged and
//! retuned while it runs.

pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod filter;
pub mod forces;
pub mod frame;
pub mod graph;
pub mod interaction;
pub mod quadtree;
pub mod scheduler;
pub mod simulation;
