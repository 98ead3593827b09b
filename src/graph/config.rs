//! Simulation and rendering parameters consumed by the graph view.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Slider ranges offered by the settings panel. The engine stays sane outside
/// them; only [`SimulationConfig::sanitized`] bounds are hard limits.
pub mod ranges {
    use std::ops::RangeInclusive;

    pub const NODE_SIZE: RangeInclusive<f32> = 2.0..=32.0;
    pub const FONT_SIZE: RangeInclusive<f32> = 8.0..=16.0;
    pub const LINK_DISTANCE: RangeInclusive<f32> = 0.0..=200.0;
    pub const LINK_WIDTH: RangeInclusive<f32> = 0.5..=16.0;
    pub const REPULSION_STRENGTH: RangeInclusive<f32> = -500.0..=-10.0;
    pub const FRICTION: RangeInclusive<f32> = 0.05..=0.9;
    pub const ALPHA: RangeInclusive<f32> = 0.1..=1.0;
    pub const ALPHA_DECAY: RangeInclusive<f32> = 0.001..=0.1;
}

/// Parameter bundle for the layout, the scene and the label policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub node_size: f32,
    pub font_size: f32,
    pub link_distance: f32,
    pub link_width: f32,
    /// Negative values push vertices apart
    pub repulsion_strength: f32,
    /// Fraction of velocity retained per tick
    pub friction: f32,
    /// Initial and reheat energy
    pub alpha: f32,
    pub alpha_decay: f32,
    pub show_all_ips: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            node_size: 8.0,
            font_size: 10.0,
            link_distance: 60.0,
            link_width: 1.5,
            repulsion_strength: -120.0,
            friction: 0.6,
            alpha: 1.0,
            // Settles in roughly 300 ticks
            alpha_decay: 0.0228,
            show_all_ips: false,
        }
    }
}

impl SimulationConfig {
    /// Return a copy satisfying the bundle invariant: every number finite,
    /// friction in [0, 1], alpha in (0, 1], alpha_decay in (0, 1].
    ///
    /// Non-finite fields fall back to their defaults; out-of-domain fields are
    /// clamped. Never fails.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let finite_or = |value: f32, fallback: f32| if value.is_finite() { value } else { fallback };

        Self {
            node_size: finite_or(self.node_size, defaults.node_size).max(0.5),
            font_size: finite_or(self.font_size, defaults.font_size).max(1.0),
            link_distance: finite_or(self.link_distance, defaults.link_distance).max(0.0),
            link_width: finite_or(self.link_width, defaults.link_width).max(0.0),
            repulsion_strength: finite_or(self.repulsion_strength, defaults.repulsion_strength),
            friction: finite_or(self.friction, defaults.friction).clamp(0.0, 1.0),
            alpha: clamp_open_low(finite_or(self.alpha, defaults.alpha), 0.0..=1.0),
            alpha_decay: clamp_open_low(finite_or(self.alpha_decay, defaults.alpha_decay), 0.0..=1.0),
            show_all_ips: self.show_all_ips,
        }
    }

    /// True when a change from `self` to `other` alters vertex radii.
    pub fn resizes_vertices(&self, other: &Self) -> bool {
        self.node_size != other.node_size
    }
}

/// Clamp into `(low, high]`; values at or below `low` become the smallest
/// positive step above it.
fn clamp_open_low(value: f32, range: RangeInclusive<f32>) -> f32 {
    let (low, high) = range.into_inner();
    if value <= low {
        low + 1e-4
    } else {
        value.min(high)
    }
}
