//! Pinning, dragging and live parameter changes
//!
//! The controller is the only writer of pin coordinates. Anything that perturbs
//! the physics reheats the simulation so it settles again from the new state
//! without restarting from scratch.

use tracing::{debug, warn};

use crate::config::{clamp_link_distance, clamp_repulsion, clamp_threshold};
use crate::engine::LayoutEngine;

/// Pointer events from whatever surface draws the network
pub trait DragEvents {
    /// Pointer pressed on a node
    fn on_drag_start(&mut self, node_id: &str, pos: [f64; 2]) -> bool;
    /// Pointer moved while holding a node
    fn on_drag_move(&mut self, node_id: &str, pos: [f64; 2]) -> bool;
    /// Pointer released
    fn on_drag_end(&mut self, node_id: &str) -> bool;
}

/// Mutates an engine in response to user input
#[derive(Debug)]
pub struct InteractionController<'a> {
    engine: &'a mut LayoutEngine,
}

impl<'a> InteractionController<'a> {
    pub(crate) fn new(engine: &'a mut LayoutEngine) -> Self {
        Self { engine }
    }

    fn set_pin(&mut self, node_id: &str, pin: Option<(f64, f64)>) -> bool {
        let Some(node) = self.engine.graph.nodes.get_mut(node_id) else {
            warn!(node = node_id, "ignoring interaction with unknown node");
            return false;
        };
        node.fx = pin.map(|(x, _)| x);
        node.fy = pin.map(|(_, y)| y);
        true
    }

    /// Fix a node at `(x, y)` and reheat
    ///
    /// Returns false for unknown ids or non-finite coordinates.
    pub fn pin(&mut self, node_id: &str, x: f64, y: f64) -> bool {
        if !(x.is_finite() && y.is_finite()) {
            warn!(node = node_id, x, y, "ignoring non-finite pin");
            return false;
        }
        if !self.set_pin(node_id, Some((x, y))) {
            return false;
        }
        let reheat = self.engine.config.reheat_alpha;
        self.engine.state.retarget(reheat);
        self.engine.state.reheat(reheat);
        debug!(node = node_id, x, y, alpha = self.engine.state.alpha, "pinned node");
        true
    }

    /// Move an already pinned node
    ///
    /// Returns false, leaving the node alone, unless it is currently pinned.
    pub fn move_pin(&mut self, node_id: &str, x: f64, y: f64) -> bool {
        if !(x.is_finite() && y.is_finite()) {
            return false;
        }
        let pinned = self.engine.graph.node(node_id).is_some_and(|n| n.is_pinned());
        if !pinned {
            debug!(node = node_id, "ignoring move of a node that is not pinned");
            return false;
        }
        self.set_pin(node_id, Some((x, y)))
    }

    /// Release a node; the simulation cools again once nothing is pinned
    pub fn unpin(&mut self, node_id: &str) -> bool {
        if !self.set_pin(node_id, None) {
            return false;
        }
        if !self.engine.graph.nodes().any(|n| n.is_pinned()) {
            self.engine.state.retarget(0.0);
        }
        debug!(node = node_id, "unpinned node");
        true
    }

    /// Set the many-body strength (clamped to [-1000, -100]) and reheat
    pub fn set_repulsion(&mut self, strength: f64) {
        self.engine.config.repulsion_strength = clamp_repulsion(strength);
        self.engine.initialize_forces();
        self.reheat("repulsion_strength");
    }

    /// Set the link rest length (clamped to [30, 300]) and reheat
    pub fn set_link_distance(&mut self, distance: f64) {
        self.engine.config.link_distance = clamp_link_distance(distance);
        self.engine.initialize_forces();
        self.reheat("link_distance");
    }

    /// Set the relation threshold (clamped to [0, 3], 0.1 steps), refilter and reheat
    pub fn set_threshold(&mut self, threshold: f64) {
        self.engine.config.relation_threshold = clamp_threshold(threshold);
        self.engine.refilter();
        self.reheat("relation_threshold");
    }

    /// Highlight a group when rendering; physics is untouched
    pub fn set_selected_group(&mut self, group: Option<String>) {
        self.engine.config.selected_group = group;
    }

    fn reheat(&mut self, parameter: &str) {
        let alpha = self.engine.config.reheat_alpha;
        self.engine.state.reheat(alpha);
        debug!(parameter, alpha = self.engine.state.alpha, "reheated simulation");
    }
}

impl DragEvents for InteractionController<'_> {
    fn on_drag_start(&mut self, node_id: &str, [x, y]: [f64; 2]) -> bool {
        self.pin(node_id, x, y)
    }

    fn on_drag_move(&mut self, node_id: &str, [x, y]: [f64; 2]) -> bool {
        self.move_pin(node_id, x, y)
    }

    fn on_drag_end(&mut self, node_id: &str) -> bool {
        self.unpin(node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::dataset::{RelationRecord, fallback_records};
    use crate::graph::build;
    use crate::simulation::Phase;

    fn settled_engine() -> LayoutEngine {
        let mut engine = LayoutEngine::new(build(&fallback_records()), LayoutConfig::default());
        engine.start();
        engine.run_to_convergence(1000);
        assert_eq!(engine.phase(), Phase::Settled);
        engine
    }

    #[test]
    fn set_repulsion_while_settled_reheats() {
        let mut engine = settled_engine();
        let before = engine.state().alpha;
        engine.controller().set_repulsion(-800.0);

        assert_eq!(engine.phase(), Phase::Running);
        assert_eq!(engine.state().alpha, engine.config().reheat_alpha);
        assert!(engine.state().alpha > before);
        assert_eq!(engine.config().repulsion_strength, -800.0);
    }

    #[test]
    fn setters_clamp_silently() {
        let mut engine = settled_engine();
        let mut controller = engine.controller();
        controller.set_repulsion(-5000.0);
        controller.set_link_distance(5.0);
        controller.set_threshold(9.0);

        assert_eq!(engine.config().repulsion_strength, -1000.0);
        assert_eq!(engine.config().link_distance, 30.0);
        assert_eq!(engine.config().relation_threshold, 3.0);
    }

    #[test]
    fn threshold_change_refilters_and_is_reversible() {
        let mut engine = LayoutEngine::new(
            build(&[
                RelationRecord::new("A", "B", "sector", 0.9),
                RelationRecord::new("A", "C", "sector", 0.9),
                RelationRecord::new("B", "C", "sector", 0.5),
            ]),
            LayoutConfig::default(),
        );
        assert_eq!(engine.active_links().len(), 3);

        engine.controller().set_threshold(0.6);
        assert_eq!(engine.active_links().len(), 2);
        assert_eq!(engine.graph().links().len(), 3);

        engine.controller().set_threshold(0.0);
        assert_eq!(engine.active_links().len(), 3);
    }

    #[test]
    fn selected_group_does_not_touch_physics() {
        let mut engine = settled_engine();
        let state = engine.state().clone();
        engine.controller().set_selected_group(Some("sector".into()));

        assert_eq!(engine.state(), &state);
        assert!(engine.step(1.0).is_none());
        assert!(engine.frame().nodes.iter().all(|n| n.highlighted));

        engine.controller().set_selected_group(Some("other".into()));
        assert!(engine.frame().nodes.iter().all(|n| !n.highlighted));
    }

    #[test]
    fn pinned_node_follows_pointer() {
        let mut engine = settled_engine();
        assert!(engine.controller().on_drag_start("MARUTI", [10.0, 20.0]));
        assert_eq!(engine.phase(), Phase::Running);

        for (i, pos) in [[15.0, 25.0], [40.0, -3.5], [41.0, -3.0]].into_iter().enumerate() {
            assert!(engine.controller().on_drag_move("MARUTI", pos));
            let frame = engine.step(1.0).expect("running while dragged");
            let node = frame.node("MARUTI").unwrap();
            assert_eq!([node.x, node.y], pos, "tick {i}");
        }
    }

    #[test]
    fn pinning_keeps_simulation_warm_until_release() {
        let mut engine = settled_engine();
        engine.controller().pin("TATAMOTORS", 400.0, 300.0);
        for _ in 0..500 {
            engine.step(1.0);
        }
        assert_eq!(engine.phase(), Phase::Running);

        assert!(engine.controller().unpin("TATAMOTORS"));
        assert_eq!(engine.state().alpha_target, 0.0);
        engine.run_to_convergence(1000);
        assert_eq!(engine.phase(), Phase::Settled);
        assert!(!engine.graph().node("TATAMOTORS").unwrap().is_pinned());
    }

    #[test]
    fn unpin_keeps_target_while_other_pins_remain() {
        let mut engine = settled_engine();
        let mut controller = engine.controller();
        controller.pin("MARUTI", 0.0, 0.0);
        controller.pin("M&M", 50.0, 0.0);
        controller.unpin("MARUTI");

        assert_eq!(engine.state().alpha_target, engine.config().reheat_alpha);
    }

    #[test]
    fn moving_an_unpinned_node_does_nothing() {
        let mut engine = settled_engine();
        let before = engine.state().clone();

        assert!(!engine.controller().move_pin("MARUTI", 5.0, 5.0));
        assert!(!engine.graph().node("MARUTI").unwrap().is_pinned());
        assert_eq!(engine.state(), &before);
        assert!(!engine.controller().move_pin("NOPE", 5.0, 5.0));
    }

    #[test]
    fn pin_raises_alpha_immediately() {
        let mut engine = settled_engine();
        let before = engine.state().alpha;
        engine.controller().pin("MARUTI", 5.0, 5.0);

        assert!(engine.state().alpha > before);
        assert_eq!(engine.phase(), Phase::Running);
    }

    #[test]
    fn unknown_or_invalid_pins_are_ignored() {
        let mut engine = settled_engine();
        let mut controller = engine.controller();

        assert!(!controller.pin("NOPE", 1.0, 1.0));
        assert!(!controller.pin("MARUTI", f64::NAN, 1.0));
        assert!(!controller.unpin("NOPE"));
        assert_eq!(engine.phase(), Phase::Settled);
    }
}
