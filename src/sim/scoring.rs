//! Score awards and the combo window

use serde::{Deserialize, Serialize};

use crate::tuning::Tuning;

/// Counts brick hits that land within the combo window of each other
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComboTracker {
    combo: u32,
    last_hit_ms: Option<f64>,
}

impl ComboTracker {
    /// Register a brick hit at `now_ms`, returning the new combo count
    pub fn register_hit(&mut self, now_ms: f64, window_ms: f64) -> u32 {
        self.combo = match self.last_hit_ms {
            Some(last) if now_ms - last <= window_ms => self.combo + 1,
            _ => 1,
        };
        self.last_hit_ms = Some(now_ms);
        self.combo
    }

    /// Shift the window by time spent paused
    pub fn postpone(&mut self, ms: f64) {
        if let Some(last) = self.last_hit_ms.as_mut() {
            *last += ms;
        }
    }

    pub fn current(&self) -> u32 {
        self.combo
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Bonus for a combo count, bounded by the tuning cap
pub fn combo_bonus(combo: u32, tuning: &Tuning) -> u64 {
    let steps = u64::from(combo.saturating_sub(1));
    (steps * tuning.combo_step).min(tuning.combo_cap)
}

/// Points for one brick hit
///
/// A hit that only chips a reinforced brick earns the flat hit award; a
/// destroying hit earns the destruction award plus the combo bonus.
pub fn hit_award(destroyed: bool, reinforced: bool, combo: u32, tuning: &Tuning) -> u64 {
    if !destroyed {
        return tuning.hit_points;
    }
    let base = tuning.destroy_points + if reinforced { tuning.reinforced_bonus } else { 0 };
    base + combo_bonus(combo, tuning)
}
