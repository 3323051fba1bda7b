//! Simulation state and the stepping function
//!
//! A tick evaluates every force against a snapshot of positions, integrates
//! velocities and positions into scratch buffers, repairs any non-finite values and
//! only then commits the result, so callers never observe a half-applied tick.

use rand::Rng;
use serde::Serialize;
use tracing::warn;

use crate::config::LayoutConfig;
use crate::forces::{ForceRegistry, Snapshot};
use crate::graph::Graph;

/// Radius of the disc used when a node has to be re-seeded near the centroid
const RESET_RADIUS: f64 = 1.0;

/// Minimum rise in alpha when a warm simulation is reheated
pub const REHEAT_STEP: f64 = 0.01;

/// Lifecycle of the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Not started, or stopped by the caller
    Idle,
    /// Ticks are being scheduled
    Running,
    /// Alpha fell below `alpha_min`; no ticks until reheated
    Settled,
}

/// Cooling schedule and run state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationState {
    /// Current temperature
    pub alpha: f64,
    /// Value alpha decays towards
    pub alpha_target: f64,
    /// Fraction of the gap to `alpha_target` closed each tick
    pub alpha_decay: f64,
    /// Alpha below which the simulation settles
    pub alpha_min: f64,
    /// Fraction of velocity lost each tick
    pub velocity_decay: f64,
    pub phase: Phase,
}

impl SimulationState {
    /// Fresh state at full temperature
    pub fn from_config(config: &LayoutConfig) -> Self {
        Self {
            alpha: 1.0,
            alpha_target: 0.0,
            alpha_decay: config.alpha_decay,
            alpha_min: config.alpha_min,
            velocity_decay: config.velocity_decay,
            phase: Phase::Idle,
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    /// Raise alpha to at least `alpha` and resume a settled simulation
    ///
    /// Alpha always ends above its previous value: when it is already at or above
    /// `alpha` it is bumped by [`REHEAT_STEP`], capped at full temperature (1.0).
    pub fn reheat(&mut self, alpha: f64) {
        self.alpha = alpha.max((self.alpha + REHEAT_STEP).min(1.0));
        self.resume();
    }

    /// Hold alpha near `target` (used while a node is dragged)
    pub fn retarget(&mut self, target: f64) {
        self.alpha_target = target;
        if target > 0.0 {
            self.resume();
        }
    }

    fn resume(&mut self) {
        if self.phase == Phase::Settled {
            self.phase = Phase::Running;
        }
    }

    /// Move alpha one tick towards its target and settle if it got cold enough
    fn cool(&mut self) {
        self.alpha += (self.alpha_target - self.alpha) * self.alpha_decay;
        if self.alpha < self.alpha_min {
            self.phase = Phase::Settled;
        }
    }
}

/// Outcome of one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// Alpha after the tick
    pub alpha: f64,
    /// Nodes whose position or velocity had to be repaired
    pub reset_nodes: usize,
    /// Whether this tick settled the simulation
    pub settled: bool,
}

/// Advance the simulation by one tick of length `dt`
///
/// Forces see only the positions from before the tick. Pinned nodes are placed
/// exactly on their pin and their velocity is cleared.
pub fn step<R: Rng>(
    state: &mut SimulationState,
    graph: &mut Graph,
    forces: &mut ForceRegistry,
    dt: f64,
    rng: &mut R,
) -> StepReport {
    let snapshot: Vec<[f64; 2]> = graph.nodes().map(|n| [n.x, n.y]).collect();
    let deltas = forces.accumulate(&Snapshot {
        positions: &snapshot,
        alpha: state.alpha,
    });

    let keep = 1.0 - state.velocity_decay;
    let mut next: Vec<[f64; 4]> = graph
        .nodes()
        .zip(&deltas)
        .map(|(node, [dvx, dvy])| match node.pinned_at() {
            Some((fx, fy)) => [fx, fy, 0.0, 0.0],
            None => {
                let vx = (node.vx + dvx * dt) * keep;
                let vy = (node.vy + dvy * dt) * keep;
                [node.x + vx * dt, node.y + vy * dt, vx, vy]
            }
        })
        .collect();

    let reset_nodes = repair(&mut next, &snapshot, graph, rng);

    for (node, [x, y, vx, vy]) in graph.nodes.values_mut().zip(next) {
        node.x = x;
        node.y = y;
        node.vx = vx;
        node.vy = vy;
    }

    let was_running = state.phase != Phase::Settled;
    state.cool();
    StepReport {
        alpha: state.alpha,
        reset_nodes,
        settled: was_running && state.phase == Phase::Settled,
    }
}

/// Replace non-finite integration results with the last good position
fn repair<R: Rng>(next: &mut [[f64; 4]], snapshot: &[[f64; 2]], graph: &Graph, rng: &mut R) -> usize {
    let bad: Vec<usize> = (0..next.len())
        .filter(|&i| !next[i].iter().all(|v| v.is_finite()))
        .collect();
    if bad.is_empty() {
        return 0;
    }

    let good: Vec<[f64; 2]> = snapshot
        .iter()
        .filter(|p| p.iter().all(|v| v.is_finite()))
        .copied()
        .collect();
    let centroid = if good.is_empty() {
        [0.0, 0.0]
    } else {
        let n = good.len() as f64;
        let (sx, sy) = good.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p[0], sy + p[1]));
        [sx / n, sy / n]
    };

    for &i in &bad {
        let [x, y] = snapshot[i];
        let [x, y] = if x.is_finite() && y.is_finite() {
            [x, y]
        } else {
            [
                centroid[0] + rng.gen_range(-RESET_RADIUS..=RESET_RADIUS),
                centroid[1] + rng.gen_range(-RESET_RADIUS..=RESET_RADIUS),
            ]
        };
        next[i] = [x, y, 0.0, 0.0];
        if let Some((id, _)) = graph.nodes.get_index(i) {
            warn!(node = %id, "reset node after non-finite integration");
        }
    }
    bad.len()
}
