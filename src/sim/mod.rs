//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must stay pure:
//! - Time comes in as parameters, never from a global clock
//! - Seeded RNG only
//! - Stable iteration order (bricks by grid position, balls by id)
//! - No rendering, storage or network dependencies

pub mod collision;
pub mod effects;
pub mod level;
pub mod scoring;
pub mod state;
pub mod tick;

pub use collision::{CollisionResult, Rect, ball_rect_collision, circle_rect_overlap, paddle_bounce};
pub use effects::{apply_power_up, update_effect_timers};
pub use level::{SeedMaterial, generate, generate_from_seed, level_seed};
pub use scoring::ComboTracker;
pub use state::{
    Ball, Brick, EffectTimers, FloatText, GameEvent, GamePhase, MatchState, Paddle, Particle,
    PowerUpDrop, PowerUpKind, SoundCue,
};
pub use tick::{StepInput, start, step, toggle_pause};
