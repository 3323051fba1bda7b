//! Force evaluators
//!
//! Each force reads the position snapshot taken at the start of a tick and adds
//! velocity changes into a shared buffer. Forces never see each other's output,
//! so they can be registered and evaluated in any order.
//!
//! The simulation includes these forces:
//!
//! - **Link Force**: springs between linked stocks, corrected in proportion to degree
//! - **Many-Body Force**: Barnes-Hut approximated repulsion between all stocks
//! - **Center Force**: removes drift of the layout's centroid

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::{Falloff, LayoutConfig};
use crate::filter::ActiveLink;
use crate::quadtree::{QuadTree, RepulsionParams, jiggle};

/// Distance floor for the link force
pub const LINK_DISTANCE_FLOOR: f64 = 1e-6;

/// Positions at the start of a tick
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub positions: &'a [[f64; 2]],
    pub alpha: f64,
}

/// What a force needs to prepare itself for a node/link set
#[derive(Debug, Clone, Copy)]
pub struct ForceSetup<'a> {
    pub node_count: usize,
    pub links: &'a [ActiveLink],
    pub config: &'a LayoutConfig,
}

/// A per-tick contribution to node velocities
pub trait Force {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// Recompute cached state after the node set, link set or parameters change
    fn initialize(&mut self, setup: &ForceSetup<'_>);

    /// Add this force's velocity changes for every node into `deltas`
    fn apply(&mut self, snapshot: &Snapshot<'_>, deltas: &mut [[f64; 2]]);
}

/// Spring force along active links
#[derive(Debug, Clone, Default)]
pub struct LinkForce {
    links: Vec<ActiveLink>,
    /// Share of each link's correction applied to its target
    bias: Vec<f64>,
    strength: Vec<f64>,
    distance: f64,
    rng: Option<StdRng>,
}

impl LinkForce {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Force for LinkForce {
    fn name(&self) -> &'static str {
        "link"
    }

    fn initialize(&mut self, setup: &ForceSetup<'_>) {
        let mut degree = vec![0usize; setup.node_count];
        for link in setup.links {
            degree[link.source] += 1;
            degree[link.target] += 1;
        }

        self.links = setup.links.to_vec();
        self.bias = self
            .links
            .iter()
            .map(|l| {
                let (s, t) = (degree[l.source] as f64, degree[l.target] as f64);
                s / (s + t)
            })
            .collect();
        self.strength = self
            .links
            .iter()
            .map(|l| {
                setup
                    .config
                    .link_strength
                    .unwrap_or_else(|| 1.0 / degree[l.source].min(degree[l.target]) as f64)
            })
            .collect();
        self.distance = setup.config.link_distance;
        self.rng = Some(StdRng::seed_from_u64(setup.config.seed ^ 0x6c69_6e6b));
    }

    fn apply(&mut self, snapshot: &Snapshot<'_>, deltas: &mut [[f64; 2]]) {
        let Some(rng) = self.rng.as_mut() else {
            return;
        };
        let positions = snapshot.positions;
        for (i, link) in self.links.iter().enumerate() {
            if link.source == link.target {
                continue;
            }
            let [sx, sy] = positions[link.source];
            let [tx, ty] = positions[link.target];
            let (mut dx, mut dy) = (tx - sx, ty - sy);
            if dx == 0.0 && dy == 0.0 {
                dx = jiggle(rng);
                dy = jiggle(rng);
            }
            let d = (dx * dx + dy * dy).sqrt().max(LINK_DISTANCE_FLOOR);
            let k = (d - self.distance) / d * snapshot.alpha * self.strength[i];
            let (cx, cy) = (dx * k, dy * k);
            let b = self.bias[i];

            deltas[link.target][0] -= cx * b;
            deltas[link.target][1] -= cy * b;
            deltas[link.source][0] += cx * (1.0 - b);
            deltas[link.source][1] += cy * (1.0 - b);
        }
    }
}

/// Repulsion (or attraction) between every pair of nodes
#[derive(Debug, Clone)]
pub struct ManyBodyForce {
    strength: f64,
    theta: f64,
    distance_min: f64,
    falloff: Falloff,
    rng: StdRng,
}

impl Default for ManyBodyForce {
    fn default() -> Self {
        Self::from_config(&LayoutConfig::default())
    }
}

impl ManyBodyForce {
    pub fn from_config(config: &LayoutConfig) -> Self {
        Self {
            strength: config.repulsion_strength,
            theta: config.theta,
            distance_min: config.distance_min,
            falloff: config.falloff,
            rng: StdRng::seed_from_u64(config.seed),
        }
    }
}

impl Force for ManyBodyForce {
    fn name(&self) -> &'static str {
        "many_body"
    }

    fn initialize(&mut self, setup: &ForceSetup<'_>) {
        *self = Self::from_config(setup.config);
    }

    fn apply(&mut self, snapshot: &Snapshot<'_>, deltas: &mut [[f64; 2]]) {
        if snapshot.positions.len() < 2 {
            return;
        }
        let tree = QuadTree::build(snapshot.positions);
        let params = RepulsionParams {
            strength: self.strength * snapshot.alpha,
            theta: self.theta,
            distance_min: self.distance_min,
            falloff: self.falloff,
        };
        for (i, delta) in deltas.iter_mut().enumerate() {
            let [fx, fy] = tree.repulsion(i, snapshot.positions, &params, &mut self.rng);
            delta[0] += fx;
            delta[1] += fy;
        }
    }
}

/// Keeps the layout's centroid on a fixed point without changing its shape
#[derive(Debug, Clone)]
pub struct CenterForce {
    center: [f64; 2],
    strength: f64,
}

impl Default for CenterForce {
    fn default() -> Self {
        Self::from_config(&LayoutConfig::default())
    }
}

impl CenterForce {
    pub fn from_config(config: &LayoutConfig) -> Self {
        Self {
            center: config.center,
            strength: config.center_strength,
        }
    }
}

impl Force for CenterForce {
    fn name(&self) -> &'static str {
        "center"
    }

    fn initialize(&mut self, setup: &ForceSetup<'_>) {
        *self = Self::from_config(setup.config);
    }

    fn apply(&mut self, snapshot: &Snapshot<'_>, deltas: &mut [[f64; 2]]) {
        let n = snapshot.positions.len();
        if n == 0 {
            return;
        }
        let (sx, sy) = snapshot
            .positions
            .iter()
            .fold((0.0_f64, 0.0_f64), |(sx, sy), &[x, y]| (sx + x, sy + y));
        let count = n as f64;
        let shift_x = (self.center[0] - sx / count) * self.strength / count;
        let shift_y = (self.center[1] - sy / count) * self.strength / count;
        for delta in deltas.iter_mut() {
            delta[0] += shift_x;
            delta[1] += shift_y;
        }
    }
}

/// The set of forces evaluated every tick
pub struct ForceRegistry {
    forces: Vec<Box<dyn Force>>,
}

impl std::fmt::Debug for ForceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.forces.iter().map(|force| force.name())).finish()
    }
}

impl Default for ForceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ForceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self { forces: Vec::new() }
    }

    /// Link, many-body and center forces
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(LinkForce::new()));
        registry.register(Box::new(ManyBodyForce::default()));
        registry.register(Box::new(CenterForce::default()));
        registry
    }

    pub fn register(&mut self, force: Box<dyn Force>) {
        self.forces.push(force);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.forces.iter().map(|f| f.name()).collect()
    }

    /// Re-initialize every force against a new node/link set or configuration
    pub fn initialize(&mut self, setup: &ForceSetup<'_>) {
        for force in &mut self.forces {
            force.initialize(setup);
        }
    }

    /// Summed velocity change per node for one tick
    pub fn accumulate(&mut self, snapshot: &Snapshot<'_>) -> Vec<[f64; 2]> {
        let mut deltas = vec![[0.0, 0.0]; snapshot.positions.len()];
        for force in &mut self.forces {
            force.apply(snapshot, &mut deltas);
        }
        deltas
    }
}
