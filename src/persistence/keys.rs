//! Storage key layout
//!
//! Each key has exactly one writer.

use crate::ledger::DayKey;

pub const PREFIX: &str = "brickfall";

pub const SETTINGS: &str = "brickfall:settings";

pub fn profile(player_id: &str) -> String {
    format!("{PREFIX}:{player_id}:profile")
}

pub fn attempts(player_id: &str, day: DayKey) -> String {
    format!("{PREFIX}:{player_id}:attempts:{day}")
}

pub fn leaderboard(player_id: &str, day: DayKey) -> String {
    format!("{PREFIX}:{player_id}:leaderboard:{day}")
}
