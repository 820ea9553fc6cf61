//! Data-driven game balance
//!
//! Every number a variant might want to change lives here instead of in the
//! simulation code. Missing fields in a JSON override fall back to defaults.

use serde::{Deserialize, Serialize};

/// Relative weights for choosing a drop type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DropWeights {
    pub widen: u32,
    pub slow: u32,
    pub multiball: u32,
}

impl Default for DropWeights {
    fn default() -> Self {
        Self {
            widen: 34,
            slow: 33,
            multiball: 33,
        }
    }
}

impl DropWeights {
    pub fn total(&self) -> u32 {
        self.widen + self.slow + self.multiball
    }
}

/// Balance table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    // === Ball ===
    /// Ball speed at level 1 (px/s)
    pub ball_base_speed: f32,
    /// Fractional speed increase per level
    pub level_speed_step: f32,
    /// Ceiling relative to the level speed
    pub max_speed_factor: f32,
    /// Speed gain per paddle bounce (fraction)
    pub bounce_accel: f32,
    /// Bounce acceleration applies strictly above this level
    pub bounce_accel_after_level: u32,

    // === Paddle ===
    /// How much of the steering term ends up in the horizontal direction
    pub paddle_steer: f32,
    /// Minimum share of speed kept vertical after a paddle bounce
    pub min_vertical_share: f32,
    /// Per-frame follow coefficient while dragging
    pub follow_rate_drag: f32,
    /// Per-frame follow coefficient while drifting
    pub follow_rate_idle: f32,

    // === Effects ===
    pub widen_width: f32,
    pub widen_ms: f64,
    pub slow_factor: f32,
    pub slow_ms: f64,
    /// Multiball never pushes the ball count past this
    pub max_balls: usize,
    /// Angle (radians) between a source ball and its clones
    pub multiball_spread: f32,

    // === Drops ===
    pub drop_chance: f32,
    pub drop_weights: DropWeights,
    pub drop_fall_speed: f32,

    // === Scoring ===
    pub hit_points: u64,
    pub destroy_points: u64,
    pub reinforced_bonus: u64,
    pub combo_window_ms: f64,
    pub combo_step: u64,
    pub combo_cap: u64,

    // === Run ===
    /// Lives per daily run (practice runs are unlimited)
    pub lives: u8,

    // === Level generation ===
    pub reinforced_base: f32,
    pub reinforced_step: f32,
    pub reinforced_max: f32,
    pub hole_chance: f32,
    pub hole_min_level: u32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            ball_base_speed: 300.0,
            level_speed_step: 0.06,
            max_speed_factor: 1.35,
            bounce_accel: 0.004,
            bounce_accel_after_level: 3,

            paddle_steer: 0.75,
            min_vertical_share: 0.35,
            follow_rate_drag: 0.35,
            follow_rate_idle: 0.18,

            widen_width: 108.0,
            widen_ms: 10_000.0,
            slow_factor: 0.78,
            slow_ms: 8_000.0,
            max_balls: 4,
            multiball_spread: 0.35,

            drop_chance: 0.14,
            drop_weights: DropWeights::default(),
            drop_fall_speed: 150.0,

            hit_points: 10,
            destroy_points: 50,
            reinforced_bonus: 30,
            combo_window_ms: 1200.0,
            combo_step: 10,
            combo_cap: 100,

            lives: 3,

            reinforced_base: 0.10,
            reinforced_step: 0.05,
            reinforced_max: 0.45,
            hole_chance: 0.08,
            hole_min_level: 4,
        }
    }
}

impl Tuning {
    /// Parse an override table, falling back to defaults on bad input
    pub fn from_json(json: &str) -> Self {
        match serde_json::from_str(json) {
            Ok(tuning) => tuning,
            Err(e) => {
                log::warn!("Ignoring malformed tuning override: {}", e);
                Self::default()
            }
        }
    }

    /// Nominal ball speed for a level
    pub fn level_speed(&self, level: u32) -> f32 {
        let level = level.max(1);
        self.ball_base_speed * (1.0 + self.level_speed_step * (level - 1) as f32)
    }

    /// Upper speed bound for a level
    pub fn max_speed(&self, level: u32) -> f32 {
        self.level_speed(level) * self.max_speed_factor
    }

    /// Probability that a generated cell is reinforced
    pub fn reinforced_chance(&self, level: u32) -> f32 {
        let level = level.max(1);
        (self.reinforced_base + self.reinforced_step * (level - 1) as f32).min(self.reinforced_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_speed_scales() {
        let t = Tuning::default();
        assert_eq!(t.level_speed(1), 300.0);
        assert!((t.level_speed(2) - 318.0).abs() < 0.001);
        assert!(t.level_speed(10) > t.level_speed(9));
        // Level 0 is treated as level 1
        assert_eq!(t.level_speed(0), t.level_speed(1));
    }

    #[test]
    fn test_partial_override() {
        let t = Tuning::from_json(r#"{ "drop_chance": 0.22, "lives": 5 }"#);
        assert_eq!(t.drop_chance, 0.22);
        assert_eq!(t.lives, 5);
        assert_eq!(t.combo_window_ms, 1200.0);
    }

    #[test]
    fn test_malformed_override() {
        let t = Tuning::from_json("{ not json");
        assert_eq!(t, Tuning::default());
    }

    #[test]
    fn test_reinforced_chance_capped() {
        let t = Tuning::default();
        assert!((t.reinforced_chance(1) - 0.10).abs() < 1e-6);
        assert!((t.reinforced_chance(50) - 0.45).abs() < 1e-6);
    }
}
