//! Layout configuration
//!
//! Holds both the runtime parameters a user tweaks while looking at the network
//! (repulsion, link distance, threshold, highlighted group) and the fixed tuning
//! constants of the simulation. Out-of-range values are clamped, never rejected.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Default Constants
// =============================================================================

/// Default many-body strength (negative = repulsion)
pub const DEFAULT_REPULSION: f64 = -300.0;

/// Allowed repulsion range (inclusive)
pub const REPULSION_RANGE: (f64, f64) = (-1000.0, -100.0);

/// Default link rest length
pub const DEFAULT_LINK_DISTANCE: f64 = 100.0;

/// Allowed link distance range (inclusive)
pub const LINK_DISTANCE_RANGE: (f64, f64) = (30.0, 300.0);

/// Allowed relation threshold range (inclusive)
pub const THRESHOLD_RANGE: (f64, f64) = (0.0, 3.0);

/// Threshold granularity, as steps per unit (0.1)
pub const THRESHOLD_STEPS_PER_UNIT: f64 = 10.0;

/// Default Barnes-Hut theta approximation threshold (0 = exact)
pub const DEFAULT_THETA: f64 = 0.9;

/// Default minimum distance for force calculations (avoids singularity)
pub const DEFAULT_DISTANCE_MIN: f64 = 1.0;

/// Default minimum alpha before the simulation settles
pub const DEFAULT_ALPHA_MIN: f64 = 0.001;

/// Default number of ticks for alpha to decay from 1 to `alpha_min`
pub const DEFAULT_ALPHA_DECAY_TICKS: f64 = 300.0;

/// Default velocity decay factor (0-1, applied each tick)
pub const DEFAULT_VELOCITY_DECAY: f64 = 0.4;

/// Alpha used when the layout is perturbed
pub const DEFAULT_REHEAT_ALPHA: f64 = 0.3;

/// Centre of the 800x600 viewport the layout targets
pub const DEFAULT_CENTER: [f64; 2] = [400.0, 300.0];

/// How repulsion weakens with distance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Falloff {
    /// Force magnitude proportional to `1 / d^2`
    #[default]
    InverseSquare,
    /// Force magnitude proportional to `1 / d`
    InverseLinear,
}

/// Complete layout configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Many-body strength (negative = repulsion)
    pub repulsion_strength: f64,
    /// Rest length of every link
    pub link_distance: f64,
    /// Links lighter than this are ignored by the physics and the renderer
    pub relation_threshold: f64,
    /// Group to highlight when rendering (no physics effect)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_group: Option<String>,
    /// Fixed link strength; `None` uses `1 / min(degree)` per link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_strength: Option<f64>,
    /// Barnes-Hut opening criterion
    pub theta: f64,
    /// Distance floor for force evaluation
    pub distance_min: f64,
    /// Repulsion falloff law
    pub falloff: Falloff,
    /// Point the layout is kept centred on
    pub center: [f64; 2],
    /// Centering strength (1 = remove all drift each tick)
    pub center_strength: f64,
    /// Alpha below which the simulation settles
    pub alpha_min: f64,
    /// Alpha decay rate per tick
    pub alpha_decay: f64,
    /// Velocity decay factor
    pub velocity_decay: f64,
    /// Alpha used when reheating
    pub reheat_alpha: f64,
    /// Seed for initial placement and jitter
    pub seed: u64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            repulsion_strength: DEFAULT_REPULSION,
            link_distance: DEFAULT_LINK_DISTANCE,
            relation_threshold: 0.0,
            selected_group: None,
            link_strength: None,
            theta: DEFAULT_THETA,
            distance_min: DEFAULT_DISTANCE_MIN,
            falloff: Falloff::default(),
            center: DEFAULT_CENTER,
            center_strength: 1.0,
            alpha_min: DEFAULT_ALPHA_MIN,
            alpha_decay: default_alpha_decay(),
            velocity_decay: DEFAULT_VELOCITY_DECAY,
            reheat_alpha: DEFAULT_REHEAT_ALPHA,
            seed: 0,
        }
    }
}

impl LayoutConfig {
    /// Load a configuration from a YAML file and clamp it into range
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a configuration from a YAML string and clamp it into range
    pub fn from_yaml(content: &str) -> ConfigResult<Self> {
        let config: LayoutConfig =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config.clamped())
    }

    /// Return a copy with every runtime parameter pulled into its valid range
    pub fn clamped(mut self) -> Self {
        self.repulsion_strength = clamp_repulsion(self.repulsion_strength);
        self.link_distance = clamp_link_distance(self.link_distance);
        self.relation_threshold = clamp_threshold(self.relation_threshold);
        self.theta = finite_or(self.theta, DEFAULT_THETA).max(0.0);
        self.distance_min = finite_or(self.distance_min, DEFAULT_DISTANCE_MIN).max(1e-6);
        self.alpha_min = finite_or(self.alpha_min, DEFAULT_ALPHA_MIN).clamp(1e-6, 1.0);
        self.alpha_decay = finite_or(self.alpha_decay, default_alpha_decay()).clamp(0.0, 1.0);
        self.velocity_decay = finite_or(self.velocity_decay, DEFAULT_VELOCITY_DECAY).clamp(0.0, 1.0);
        self.reheat_alpha = finite_or(self.reheat_alpha, DEFAULT_REHEAT_ALPHA).clamp(0.0, 1.0);
        self.center_strength = finite_or(self.center_strength, 1.0).clamp(0.0, 1.0);
        self.link_strength = self.link_strength.filter(|s| s.is_finite() && *s >= 0.0);
        if !self.center.iter().all(|c| c.is_finite()) {
            self.center = DEFAULT_CENTER;
        }
        self
    }
}

/// Decay rate that takes alpha from 1 to `DEFAULT_ALPHA_MIN` in `DEFAULT_ALPHA_DECAY_TICKS`
pub fn default_alpha_decay() -> f64 {
    1.0 - DEFAULT_ALPHA_MIN.powf(1.0 / DEFAULT_ALPHA_DECAY_TICKS)
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

fn clamp_to(name: &str, value: f64, (lo, hi): (f64, f64), fallback: f64) -> f64 {
    let clamped = if value.is_nan() { fallback } else { value.clamp(lo, hi) };
    if clamped != value {
        debug!(parameter = name, requested = value, applied = clamped, "clamped parameter");
    }
    clamped
}

/// Clamp a repulsion strength into [-1000, -100]
pub fn clamp_repulsion(value: f64) -> f64 {
    clamp_to("repulsion_strength", value, REPULSION_RANGE, DEFAULT_REPULSION)
}

/// Clamp a link distance into [30, 300]
pub fn clamp_link_distance(value: f64) -> f64 {
    clamp_to("link_distance", value, LINK_DISTANCE_RANGE, DEFAULT_LINK_DISTANCE)
}

/// Clamp a relation threshold into [0, 3] and snap it to 0.1 steps
pub fn clamp_threshold(value: f64) -> f64 {
    let snapped = (value * THRESHOLD_STEPS_PER_UNIT).round() / THRESHOLD_STEPS_PER_UNIT;
    clamp_to("relation_threshold", snapped, THRESHOLD_RANGE, 0.0)
}
