//! Match state and core simulation types
//!
//! Everything the frame loop mutates lives in [`MatchState`]; nothing here
//! reads a clock or touches storage.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::collision::Rect;
use super::scoring::ComboTracker;
use crate::consts::*;
use crate::tuning::Tuning;

/// Current phase of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Level laid out, ball resting on the paddle, waiting for launch
    Idle,
    /// Active gameplay
    Running,
    /// Frozen by the player
    Paused,
    /// Out of lives
    GameOver,
    /// Every brick cleared
    Win,
}

impl GamePhase {
    /// Terminal for the current level
    pub fn is_terminal(self) -> bool {
        matches!(self, GamePhase::GameOver | GamePhase::Win)
    }
}

/// A brick in the level grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brick {
    pub id: u32,
    /// Top-left corner
    pub pos: Vec2,
    pub size: Vec2,
    pub alive: bool,
    pub hp: u8,
    /// Hit points at generation (2 = reinforced)
    pub max_hp: u8,
}

impl Brick {
    pub fn new(id: u32, pos: Vec2, size: Vec2, hp: u8) -> Self {
        Self {
            id,
            pos,
            size,
            alive: hp > 0,
            hp,
            max_hp: hp,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::from_top_left(self.pos, self.size)
    }

    pub fn center(&self) -> Vec2 {
        self.pos + self.size * 0.5
    }

    pub fn is_reinforced(&self) -> bool {
        self.max_hp > 1
    }
}

/// A ball entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ball {
    pub id: u32,
    pub pos: Vec2,
    /// Nominal velocity; the slow effect scales movement, not this vector
    pub vel: Vec2,
    pub radius: f32,
    /// False while the ball rides on the paddle
    pub launched: bool,
}

impl Ball {
    pub fn new(id: u32, pos: Vec2) -> Self {
        Self {
            id,
            pos,
            vel: Vec2::ZERO,
            radius: BALL_RADIUS,
            launched: false,
        }
    }

    pub fn speed(&self) -> f32 {
        self.vel.length()
    }

    /// Keep an unlaunched ball sitting on top of the paddle
    pub fn ride(&mut self, paddle: &Paddle) {
        if !self.launched {
            self.pos = Vec2::new(paddle.x, paddle.top() - self.radius - 1.0);
        }
    }
}

/// The player's paddle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paddle {
    /// Center x
    pub x: f32,
    /// Where input wants the paddle to be
    pub target_x: f32,
    /// Center y
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Horizontal speed over the last frame (px/s)
    pub speed: f32,
    /// Pointer is actively dragging
    pub dragging: bool,
}

impl Default for Paddle {
    fn default() -> Self {
        Self {
            x: FIELD_WIDTH / 2.0,
            target_x: FIELD_WIDTH / 2.0,
            y: PADDLE_Y,
            width: PADDLE_WIDTH,
            height: PADDLE_HEIGHT,
            speed: 0.0,
            dragging: false,
        }
    }
}

impl Paddle {
    pub fn rect(&self) -> Rect {
        Rect::from_center(Vec2::new(self.x, self.y), Vec2::new(self.width, self.height))
    }

    pub fn top(&self) -> f32 {
        self.y - self.height / 2.0
    }

    /// Exponential smoothing toward `target_x`, frame-rate independent
    pub fn follow(&mut self, dt: f32, rate: f32) {
        let before = self.x;
        let blend = 1.0 - (1.0 - rate).powf(dt * 60.0);
        self.x += (self.target_x - self.x) * blend;
        self.clamp_to_field();
        self.speed = if dt > 0.0 { (self.x - before) / dt } else { 0.0 };
    }

    pub fn clamp_to_field(&mut self) {
        let half = self.width / 2.0;
        self.x = self.x.clamp(half, FIELD_WIDTH - half);
    }
}

/// Power-up types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerUpKind {
    Widen,
    Slow,
    Multiball,
}

impl PowerUpKind {
    pub fn label(self) -> &'static str {
        match self {
            PowerUpKind::Widen => "WIDE",
            PowerUpKind::Slow => "SLOW",
            PowerUpKind::Multiball => "MULTI",
        }
    }
}

/// A falling pickup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerUpDrop {
    pub id: u32,
    pub kind: PowerUpKind,
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    pub alive: bool,
}

/// Deadlines (ms, caller clock) for timed effects
///
/// Multiball has no deadline; it is bounded by the ball cap instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectTimers {
    pub widen_until: Option<f64>,
    pub slow_until: Option<f64>,
}

impl EffectTimers {
    pub fn widen_active(&self) -> bool {
        self.widen_until.is_some()
    }

    pub fn slow_active(&self) -> bool {
        self.slow_until.is_some()
    }

    /// Push running deadlines back by `ms` (time spent paused)
    pub fn postpone(&mut self, ms: f64) {
        for until in [&mut self.widen_until, &mut self.slow_until].into_iter().flatten() {
            *until += ms;
        }
    }

    /// Movement multiplier applied to every ball
    pub fn speed_multiplier(&self, tuning: &Tuning) -> f32 {
        if self.slow_active() {
            tuning.slow_factor
        } else {
            1.0
        }
    }
}

/// A particle for visual effects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    /// Palette index for the renderer
    pub color: u32,
    /// Seconds left
    pub life: f32,
    pub size: f32,
}

/// Rising score/combo label
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloatText {
    pub pos: Vec2,
    pub vel: Vec2,
    pub life: f32,
    pub text: String,
}

/// Fire-and-forget audio cues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoundCue {
    WallHit,
    PaddleHit,
    BrickHit,
    BrickBreak,
    PowerUp,
    Launch,
    LifeLost,
    LevelClear,
    GameOver,
}

/// Everything the step reports back to its caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    Sound(SoundCue),
    Haptic { ms: u32 },
    ScoreChanged { score: u64, delta: u64 },
    ComboChanged { combo: u32 },
    BrickDestroyed { id: u32 },
    DropSpawned { kind: PowerUpKind },
    PowerUpApplied { kind: PowerUpKind },
    EffectExpired { kind: PowerUpKind },
    /// Cosmetic notification, e.g. a capped multiball
    Notice(String),
    Launched,
    Paused,
    Resumed,
    BallLost { remaining: usize },
    /// `lives_left` is `None` when lives are unlimited
    LifeLost { lives_left: Option<u8> },
    LevelCleared { level: u32, score: u64 },
    GameOver { level: u32, score: u64 },
}

/// Complete state of one match
#[derive(Debug, Clone)]
pub struct MatchState {
    /// 1-based level number
    pub level: u32,
    /// Seed the current layout was generated from
    pub seed: u64,
    pub phase: GamePhase,
    /// `None` = unlimited lives
    pub lives: Option<u8>,
    pub score: u64,
    pub combo: ComboTracker,
    pub paddle: Paddle,
    pub balls: Vec<Ball>,
    pub bricks: Vec<Brick>,
    pub drops: Vec<PowerUpDrop>,
    pub effects: EffectTimers,
    pub particles: Vec<Particle>,
    pub float_texts: Vec<FloatText>,
    /// Paddle bounces this level (drives progressive acceleration)
    pub paddle_bounces: u32,
    pub tuning: Tuning,
    /// Set once the current level's terminal event has been emitted
    pub(crate) terminal_emitted: bool,
    /// Clock reading when the match was paused
    pub(crate) paused_at: Option<f64>,
    /// Gameplay RNG (drop rolls, launch angle), seeded from the layout seed
    pub(crate) rng: Pcg32,
    /// Frames stepped while running
    pub frame: u64,
    next_id: u32,
}

impl MatchState {
    /// Fresh match on `level` with an already generated layout
    pub fn new(level: u32, seed: u64, bricks: Vec<Brick>, tuning: Tuning, lives: Option<u8>) -> Self {
        let next_id = bricks.iter().map(|b| b.id).max().unwrap_or(0) + 1;
        let mut state = Self {
            level: level.max(1),
            seed,
            phase: GamePhase::Idle,
            lives,
            score: 0,
            combo: ComboTracker::default(),
            paddle: Paddle::default(),
            balls: Vec::new(),
            bricks,
            drops: Vec::new(),
            effects: EffectTimers::default(),
            particles: Vec::new(),
            float_texts: Vec::new(),
            paddle_bounces: 0,
            tuning,
            terminal_emitted: false,
            paused_at: None,
            rng: gameplay_rng(seed),
            frame: 0,
            next_id,
        };
        state.serve_ball();
        state
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Put a fresh unlaunched ball on the paddle
    pub fn serve_ball(&mut self) {
        let id = self.next_entity_id();
        let mut ball = Ball::new(id, Vec2::ZERO);
        ball.ride(&self.paddle);
        self.balls.push(ball);
    }

    pub fn alive_bricks(&self) -> usize {
        self.bricks.iter().filter(|b| b.alive).count()
    }

    /// Add points; score never decreases within a match
    pub fn add_score(&mut self, delta: u64) {
        self.score = self.score.saturating_add(delta);
    }

    /// Load the next level's layout, keeping score, lives and combo history
    ///
    /// Round-local state (paddle, balls, drops, effects) is reset and the
    /// match goes straight back to running with a served ball.
    pub fn advance_level(&mut self, level: u32, seed: u64, bricks: Vec<Brick>) {
        self.level = level.max(1);
        self.seed = seed;
        self.rng = gameplay_rng(seed);
        self.next_id = bricks.iter().map(|b| b.id).max().unwrap_or(0) + 1;
        self.bricks = bricks;
        self.paddle = Paddle::default();
        self.balls.clear();
        self.drops.clear();
        self.effects = EffectTimers::default();
        self.paddle_bounces = 0;
        self.terminal_emitted = false;
        self.paused_at = None;
        self.phase = GamePhase::Running;
        self.serve_ball();
    }
}

/// Gameplay RNG stream, decorrelated from the layout stream
fn gameplay_rng(seed: u64) -> Pcg32 {
    Pcg32::seed_from_u64(seed ^ 0x9e37_79b9_7f4a_7c15)
}
