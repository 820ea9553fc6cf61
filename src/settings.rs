//! Game settings and preferences
//!
//! Persisted under `brickfall:settings`, shared by every player on the device.

use serde::{Deserialize, Serialize};

use crate::persistence::{Repository, StoreError};

/// Game settings/preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Audio ===
    /// Silence all sound cues
    pub muted: bool,
    /// Master volume (0.0 - 1.0)
    pub master_volume: f32,

    // === Feedback ===
    /// Vibrate on hits (where supported)
    pub haptics: bool,
    /// Reduced motion (fewer particles, no float texts)
    pub reduced_motion: bool,

    // === Play ===
    /// Pause a running match when the window loses focus
    pub pause_on_blur: bool,
    /// Start in practice mode instead of daily
    pub practice_default: bool,
    /// Remote leaderboard endpoint; `None` keeps results local
    pub leaderboard_url: Option<String>,
    /// Display name; the wallet address is used when unset
    pub player_name: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            muted: false,
            master_volume: 0.8,

            haptics: true,
            reduced_motion: false,

            pause_on_blur: true,
            practice_default: false,
            leaderboard_url: None,
            player_name: None,
        }
    }
}

impl Settings {
    pub fn load(repo: &mut Repository) -> Self {
        let mut settings = repo.load_settings();
        settings.master_volume = settings.master_volume.clamp(0.0, 1.0);
        settings
    }

    pub fn save(&self, repo: &mut Repository) -> Result<(), StoreError> {
        repo.save_settings(self)?;
        log::info!("Settings saved");
        Ok(())
    }

    /// Flip the mute flag; returns the new value
    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }

    /// Volume actually applied to sound cues
    pub fn effective_volume(&self) -> f32 {
        if self.muted { 0.0 } else { self.master_volume }
    }

    /// Name shown on the HUD
    pub fn display_name<'a>(&'a self, player_id: &'a str) -> &'a str {
        self.player_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(player_id)
    }
}
