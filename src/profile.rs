//! Player profile: XP, best score, streak and skins
//!
//! One profile per player id, persisted under `brickfall:<player>:profile`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::{DailyReward, DayKey, next_streak};

/// XP needed for player level `n` is `100 * (n - 1)^2`
const XP_LEVEL_SCALE: f64 = 100.0;

/// Cosmetic paddle/ball skin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Skin {
    pub id: &'static str,
    pub name: &'static str,
    /// Player level that unlocks this skin
    pub unlock_level: u32,
}

/// All skins in unlock order
pub const SKINS: &[Skin] = &[
    Skin {
        id: "classic",
        name: "Classic",
        unlock_level: 1,
    },
    Skin {
        id: "neon",
        name: "Neon",
        unlock_level: 3,
    },
    Skin {
        id: "sunset",
        name: "Sunset",
        unlock_level: 5,
    },
    Skin {
        id: "void",
        name: "Void",
        unlock_level: 8,
    },
    Skin {
        id: "gold",
        name: "Gold",
        unlock_level: 12,
    },
];

pub const DEFAULT_SKIN: &str = "classic";

pub fn find_skin(id: &str) -> Option<&'static Skin> {
    SKINS.iter().find(|s| s.id == id)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkinError {
    #[error("unknown skin '{0}'")]
    Unknown(String),
    #[error("skin '{skin}' unlocks at level {required} (currently {level})")]
    Locked {
        skin: String,
        required: u32,
        level: u32,
    },
}

/// Player level for a total XP
pub fn level_for_xp(xp: u64) -> u32 {
    ((xp as f64 / XP_LEVEL_SCALE).sqrt().floor() as u32) + 1
}

/// Total XP at which `level` starts
pub fn xp_for_level(level: u32) -> u64 {
    let n = level.saturating_sub(1) as u64;
    n * n * XP_LEVEL_SCALE as u64
}

/// XP earned by one committed result
pub fn xp_for_result(score_gained: u64, level: u32, won: bool) -> u64 {
    let base = score_gained / 25;
    if won { base + 20 + 5 * level as u64 } else { base }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub player_id: String,
    pub xp: u64,
    pub best_score: u64,
    pub streak: u32,
    pub last_play_date: Option<DayKey>,
    pub games_played: u32,
    pub unlocked_skins: Vec<String>,
    pub selected_skin: String,
}

impl Default for Profile {
    fn default() -> Self {
        Self::new("guest")
    }
}

impl Profile {
    pub fn new(player_id: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            xp: 0,
            best_score: 0,
            streak: 0,
            last_play_date: None,
            games_played: 0,
            unlocked_skins: vec![DEFAULT_SKIN.to_string()],
            selected_skin: DEFAULT_SKIN.to_string(),
        }
    }

    pub fn level(&self) -> u32 {
        level_for_xp(self.xp)
    }

    /// Fraction of the way to the next level, for the HUD bar
    pub fn level_progress(&self) -> f32 {
        let level = self.level();
        let start = xp_for_level(level);
        let end = xp_for_level(level + 1);
        (self.xp - start) as f32 / (end - start).max(1) as f32
    }

    /// Add XP and return the skins it unlocked
    pub fn add_xp(&mut self, xp: u64) -> Vec<&'static Skin> {
        let before = self.level();
        self.xp = self.xp.saturating_add(xp);
        let after = self.level();
        if after > before {
            log::info!("Player {} reached level {}", self.player_id, after);
        }
        self.refresh_unlocks()
    }

    /// Make `unlocked_skins` agree with the current level
    ///
    /// Also repairs profiles whose selected skin is missing or locked.
    pub fn refresh_unlocks(&mut self) -> Vec<&'static Skin> {
        let level = self.level();
        let mut newly = Vec::new();
        for skin in SKINS.iter().filter(|s| s.unlock_level <= level) {
            if !self.unlocked_skins.iter().any(|id| id == skin.id) {
                self.unlocked_skins.push(skin.id.to_string());
                newly.push(skin);
            }
        }
        if !self.is_unlocked(&self.selected_skin) {
            self.selected_skin = DEFAULT_SKIN.to_string();
        }
        newly
    }

    pub fn is_unlocked(&self, skin_id: &str) -> bool {
        find_skin(skin_id).is_some_and(|s| s.unlock_level <= self.level())
    }

    pub fn select_skin(&mut self, skin_id: &str) -> Result<(), SkinError> {
        let skin = find_skin(skin_id).ok_or_else(|| SkinError::Unknown(skin_id.to_string()))?;
        let level = self.level();
        if skin.unlock_level > level {
            return Err(SkinError::Locked {
                skin: skin.id.to_string(),
                required: skin.unlock_level,
                level,
            });
        }
        self.selected_skin = skin.id.to_string();
        Ok(())
    }

    /// Record a committed result; `true` if it set a new best
    pub fn record_score(&mut self, score: u64) -> bool {
        if score > self.best_score {
            self.best_score = score;
            true
        } else {
            false
        }
    }

    /// First play of the day: advance the streak and grant the reward
    ///
    /// Returns `None` when today was already claimed.
    pub fn check_in(&mut self, today: DayKey) -> Option<DailyReward> {
        if self.last_play_date == Some(today) {
            return None;
        }
        self.streak = next_streak(self.last_play_date, self.streak, today);
        self.last_play_date = Some(today);

        let reward = DailyReward::for_streak(self.streak);
        self.add_xp(reward.xp);
        log::info!(
            "Daily reward for {}: streak {}, +{} XP, +{} attempts",
            self.player_id,
            reward.streak,
            reward.xp,
            reward.bonus_attempts
        );
        Some(reward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> DayKey {
        DayKey::parse(s).unwrap()
    }

    #[test]
    fn test_level_curve() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(level_for_xp(399), 2);
        assert_eq!(level_for_xp(400), 3);
        for level in 1..20 {
            assert_eq!(level_for_xp(xp_for_level(level)), level);
        }
    }

    #[test]
    fn test_xp_for_result() {
        assert_eq!(xp_for_result(500, 1, false), 20);
        assert_eq!(xp_for_result(500, 2, true), 20 + 20 + 10);
        assert_eq!(xp_for_result(0, 1, false), 0);
    }

    #[test]
    fn test_skin_unlocks() {
        let mut profile = Profile::new("p");
        assert_eq!(
            profile.select_skin("neon"),
            Err(SkinError::Locked {
                skin: "neon".to_string(),
                required: 3,
                level: 1
            })
        );
        assert!(matches!(profile.select_skin("plaid"), Err(SkinError::Unknown(_))));

        let unlocked = profile.add_xp(xp_for_level(5));
        let ids: Vec<_> = unlocked.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["neon", "sunset"]);
        assert!(profile.select_skin("sunset").is_ok());
        assert_eq!(profile.selected_skin, "sunset");
    }

    #[test]
    fn test_refresh_repairs_tampered_selection() {
        let mut profile = Profile::new("p");
        profile.selected_skin = "gold".to_string();
        profile.refresh_unlocks();
        assert_eq!(profile.selected_skin, DEFAULT_SKIN);
    }

    #[test]
    fn test_check_in_once_per_day() {
        let mut profile = Profile::new("p");
        let reward = profile.check_in(day("2024-01-01")).unwrap();
        assert_eq!(reward.streak, 1);
        assert_eq!(profile.xp, 25);

        assert!(profile.check_in(day("2024-01-01")).is_none());
        assert_eq!(profile.xp, 25);

        let reward = profile.check_in(day("2024-01-02")).unwrap();
        assert_eq!(reward.streak, 2);

        let reward = profile.check_in(day("2024-01-05")).unwrap();
        assert_eq!(reward.streak, 1);
        assert_eq!(profile.xp, 75);
    }

    #[test]
    fn test_seventh_day_bonus() {
        let mut profile = Profile::new("p");
        profile.streak = 6;
        profile.last_play_date = Some(day("2024-03-06"));
        let reward = profile.check_in(day("2024-03-07")).unwrap();
        assert_eq!(reward.streak, 7);
        assert_eq!(reward.bonus_attempts, 1);
    }

    #[test]
    fn test_best_score() {
        let mut profile = Profile::new("p");
        assert!(profile.record_score(100));
        assert!(!profile.record_score(50));
        assert!(!profile.record_score(100));
        assert_eq!(profile.best_score, 100);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let profile: Profile = serde_json::from_str(r#"{"player_id":"p","xp":150}"#).unwrap();
        assert_eq!(profile.level(), 2);
        assert_eq!(profile.selected_skin, DEFAULT_SKIN);
    }
}
