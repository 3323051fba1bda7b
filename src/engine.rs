//! Layout engine
//!
//! Owns one dataset's graph, its active link subset, the force registry and the
//! cooling state. Stepping is driven from outside (see [`crate::scheduler`]), so the
//! engine runs the same way in a render loop and in a headless test.
//!
//! # Example
//!
//! ```
//! use stocknet::config::LayoutConfig;
//! use stocknet::dataset::fallback_records;
//! use stocknet::engine::LayoutEngine;
//! use stocknet::graph::build;
//!
//! let mut engine = LayoutEngine::new(build(&fallback_records()), LayoutConfig::default());
//! engine.start();
//! engine.run_to_convergence(500);
//!
//! for node in engine.frame().nodes {
//!     println!("{} at ({:.1}, {:.1})", node.id, node.x, node.y);
//! }
//! ```

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::LayoutConfig;
use crate::filter::{ActiveLink, active_links};
use crate::forces::{ForceRegistry, ForceSetup};
use crate::frame::{Frame, Palette};
use crate::graph::{Graph, GraphBuild};
use crate::interaction::InteractionController;
use crate::simulation::{self, Phase, SimulationState};

/// Spacing of the initial phyllotaxis spiral
const INITIAL_RADIUS: f64 = 10.0;

/// Force-directed layout for one dataset
#[derive(Debug)]
pub struct LayoutEngine {
    pub(crate) graph: Graph,
    groups: Vec<String>,
    palette: Palette,
    pub(crate) config: LayoutConfig,
    pub(crate) active: Vec<ActiveLink>,
    forces: ForceRegistry,
    pub(crate) state: SimulationState,
    rng: StdRng,
    ticks: u64,
}

impl LayoutEngine {
    /// Create an engine for a freshly built graph, using the standard forces
    pub fn new(build: GraphBuild, config: LayoutConfig) -> Self {
        Self::with_forces(build, config, ForceRegistry::standard())
    }

    /// Create an engine with a custom force registry
    pub fn with_forces(build: GraphBuild, config: LayoutConfig, forces: ForceRegistry) -> Self {
        let config = config.clamped();
        let GraphBuild { mut graph, groups, .. } = build;
        let mut rng = StdRng::seed_from_u64(config.seed);
        place(&mut graph, config.center, &mut rng);

        let palette = Palette::new(&groups);
        let active = active_links(&graph, config.relation_threshold);
        let state = SimulationState::from_config(&config);
        let mut engine = Self {
            graph,
            groups,
            palette,
            config,
            active,
            forces,
            state,
            rng,
            ticks: 0,
        };
        engine.initialize_forces();
        info!(
            nodes = engine.graph.node_count(),
            links = engine.graph.links().len(),
            active = engine.active.len(),
            "layout engine ready"
        );
        engine
    }

    pub(crate) fn initialize_forces(&mut self) {
        self.forces.initialize(&ForceSetup {
            node_count: self.graph.node_count(),
            links: &self.active,
            config: &self.config,
        });
    }

    /// Recompute the active links after a threshold change
    pub(crate) fn refilter(&mut self) {
        self.active = active_links(&self.graph, self.config.relation_threshold);
        debug!(
            threshold = self.config.relation_threshold,
            active = self.active.len(),
            "recomputed active links"
        );
        self.initialize_forces();
    }

    /// Begin (or resume) scheduling ticks
    pub fn start(&mut self) {
        self.state.phase = if self.state.alpha < self.state.alpha_min {
            Phase::Settled
        } else {
            Phase::Running
        };
    }

    /// Stop scheduling ticks; all state is kept
    pub fn stop(&mut self) {
        self.state.phase = Phase::Idle;
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Group labels in legend order
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn active_links(&self) -> &[ActiveLink] {
        &self.active
    }

    /// Ticks run since construction
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run one tick if the simulation is running
    pub fn step(&mut self, dt: f64) -> Option<Frame> {
        if !self.state.is_running() {
            return None;
        }
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 1.0 };
        let report = simulation::step(
            &mut self.state,
            &mut self.graph,
            &mut self.forces,
            dt,
            &mut self.rng,
        );
        self.ticks += 1;
        if report.settled {
            info!(ticks = self.ticks, alpha = report.alpha, "layout settled");
        }
        Some(self.frame())
    }

    /// Step until settled or `max_steps` ticks have run; returns the ticks run
    pub fn run_to_convergence(&mut self, max_steps: usize) -> usize {
        let mut steps = 0;
        while steps < max_steps && self.step(1.0).is_some() {
            steps += 1;
        }
        steps
    }

    /// Current positions, active links and alpha
    pub fn frame(&self) -> Frame {
        Frame::capture(
            &self.graph,
            &self.active,
            self.state.alpha,
            self.config.selected_group.as_deref(),
        )
    }

    /// Pin, drag and parameter changes
    pub fn controller(&mut self) -> InteractionController<'_> {
        InteractionController::new(self)
    }
}

/// Lay nodes out on a phyllotaxis spiral around `center`, rotated by the seed
fn place(graph: &mut Graph, center: [f64; 2], rng: &mut StdRng) {
    let golden = PI * (3.0 - 5.0_f64.sqrt());
    let rotation = rng.gen_range(0.0..2.0 * PI);
    for (i, node) in graph.nodes.values_mut().enumerate() {
        let radius = INITIAL_RADIUS * (0.5 + i as f64).sqrt();
        let angle = rotation + i as f64 * golden;
        node.x = center[0] + radius * angle.cos();
        node.y = center[1] + radius * angle.sin();
        node.vx = 0.0;
        node.vy = 0.0;
    }
}
