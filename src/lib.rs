//! Brickfall - a daily brick breaker
//!
//! Core modules:
//! - `sim`: Deterministic simulation (level generation, physics, effects, scoring)
//! - `session`: Game state machine tying the engine to attempts, profile and leaderboards
//! - `ledger`: Daily attempts and play streaks
//! - `persistence`: Key-value storage with typed, self-healing records
//! - `leaderboard`: Signed score submission and ranked queries
//! - `tuning`: Data-driven game balance

pub mod audio;
pub mod highscores;
pub mod leaderboard;
pub mod ledger;
pub mod persistence;
pub mod platform;
pub mod profile;
pub mod session;
pub mod settings;
pub mod sim;
pub mod tuning;

pub use highscores::HighScores;
pub use ledger::{AttemptLedger, DayKey};
pub use profile::Profile;
pub use session::{GameMode, GameSession};
pub use settings::Settings;
pub use tuning::Tuning;

/// Name embedded in signed score messages
pub const GAME_NAME: &str = "Brickfall";

/// Game configuration constants
pub mod consts {
    /// Playfield dimensions (portrait, CSS pixels)
    pub const FIELD_WIDTH: f32 = 360.0;
    pub const FIELD_HEIGHT: f32 = 640.0;

    /// Largest step the simulation accepts; longer frames are clamped
    pub const MAX_DT: f32 = 1.0 / 30.0;

    /// Paddle geometry
    pub const PADDLE_WIDTH: f32 = 72.0;
    pub const PADDLE_HEIGHT: f32 = 12.0;
    /// Vertical center of the paddle
    pub const PADDLE_Y: f32 = 600.0;

    /// Ball radius
    pub const BALL_RADIUS: f32 = 7.0;

    /// Brick grid
    pub const BRICK_COLUMNS: u32 = 7;
    pub const MIN_BRICK_ROWS: u32 = 4;
    pub const MAX_BRICK_ROWS: u32 = 8;
    pub const BRICK_HEIGHT: f32 = 18.0;
    pub const BRICK_GAP: f32 = 6.0;
    pub const BRICK_MARGIN: f32 = 16.0;
    pub const BRICK_TOP: f32 = 72.0;

    /// Power-up drop radius
    pub const DROP_RADIUS: f32 = 9.0;

    /// Cosmetic caps
    pub const MAX_PARTICLES: usize = 256;
    pub const MAX_FLOAT_TEXTS: usize = 24;

    /// Daily attempts before bonuses
    pub const DAILY_ATTEMPTS: u32 = 3;
    /// Local leaderboard size
    pub const MAX_HIGH_SCORES: usize = 10;
}
