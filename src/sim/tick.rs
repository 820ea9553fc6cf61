//! Per-frame simulation step
//!
//! Advances one match by a (clamped) frame delta and reports what happened as
//! a list of events. The caller owns the clock and passes `now_ms` in.

use glam::Vec2;
use rand::Rng;

use super::collision::{ball_rect_collision, bounce_off, circle_rect_overlap, paddle_bounce, resolve_walls};
use super::effects::{apply_power_up, roll_drop, spawn_drop, update_effect_timers};
use super::scoring::hit_award;
use super::state::{FloatText, GameEvent, GamePhase, MatchState, Particle, SoundCue};
use crate::consts::*;

/// Input commands for a single frame
#[derive(Debug, Clone, Default)]
pub struct StepInput {
    /// Pointer x in playfield coordinates
    pub pointer_x: Option<f32>,
    /// Pointer is held down (faster paddle follow)
    pub dragging: bool,
    /// Launch served balls (tap/click/space)
    pub launch: bool,
    /// Pause toggle
    pub pause: bool,
}

/// Advance the match by `dt` seconds
///
/// Only a running match moves. Pausing freezes everything, cosmetics
/// included. Within a frame: effect expiry, paddle, balls (walls, bottom
/// exit, paddle, at most one brick), drops, cosmetics, then win/loss.
pub fn step(state: &mut MatchState, input: &StepInput, dt: f32, now_ms: f64) -> Vec<GameEvent> {
    let mut events = Vec::new();

    if input.pause {
        toggle_pause(state, now_ms, &mut events);
    }
    if state.phase != GamePhase::Running {
        return events;
    }

    let dt = dt.clamp(0.0, MAX_DT);
    state.frame += 1;

    events.extend(update_effect_timers(state, now_ms));

    // Paddle
    if let Some(x) = input.pointer_x {
        state.paddle.target_x = x;
    }
    state.paddle.dragging = input.dragging;
    let rate = if input.dragging {
        state.tuning.follow_rate_drag
    } else {
        state.tuning.follow_rate_idle
    };
    state.paddle.follow(dt, rate);
    for ball in &mut state.balls {
        ball.ride(&state.paddle);
    }

    if input.launch {
        launch_served(state, &mut events);
    }

    step_balls(state, dt, now_ms, &mut events);
    step_drops(state, dt, now_ms, &mut events);
    step_cosmetics(state, dt);

    if state.alive_bricks() == 0 {
        enter_win(state, &mut events);
    } else if state.balls.is_empty() {
        lose_life(state, &mut events);
    }

    events
}

/// Leave `Idle` and launch the served ball
///
/// The attempt check belongs to the caller; this only moves the match.
pub fn start(state: &mut MatchState) -> Vec<GameEvent> {
    let mut events = Vec::new();
    if state.phase == GamePhase::Idle {
        state.phase = GamePhase::Running;
        launch_served(state, &mut events);
    }
    events
}

/// Toggle between running and paused; other phases ignore it
///
/// Time spent paused does not count against effect deadlines or the combo
/// window.
pub fn toggle_pause(state: &mut MatchState, now_ms: f64, events: &mut Vec<GameEvent>) {
    match state.phase {
        GamePhase::Running => {
            state.phase = GamePhase::Paused;
            state.paused_at = Some(now_ms);
            events.push(GameEvent::Paused);
        }
        GamePhase::Paused => {
            state.phase = GamePhase::Running;
            if let Some(paused_at) = state.paused_at.take() {
                let held = (now_ms - paused_at).max(0.0);
                state.effects.postpone(held);
                state.combo.postpone(held);
            }
            events.push(GameEvent::Resumed);
        }
        _ => {}
    }
}

/// Launch every ball still riding the paddle
fn launch_served(state: &mut MatchState, events: &mut Vec<GameEvent>) {
    if state.balls.iter().all(|b| b.launched) {
        return;
    }

    let speed = state.tuning.level_speed(state.level);
    // Paddle motion adds english; a little seeded jitter avoids vertical loops
    let english = (state.paddle.speed / 600.0).clamp(-0.4, 0.4);
    let jitter: f32 = state.rng.random_range(-0.25..0.25);
    let dir = Vec2::new((english + jitter).clamp(-0.6, 0.6), -1.0).normalize();

    for ball in state.balls.iter_mut().filter(|b| !b.launched) {
        ball.vel = dir * speed;
        ball.launched = true;
    }
    events.push(GameEvent::Launched);
    events.push(GameEvent::Sound(SoundCue::Launch));
}

fn step_balls(state: &mut MatchState, dt: f32, now_ms: f64, events: &mut Vec<GameEvent>) {
    let multiplier = state.effects.speed_multiplier(&state.tuning);
    let paddle_rect = state.paddle.rect();
    let max_speed = state.tuning.max_speed(state.level);
    let accelerate = state.level > state.tuning.bounce_accel_after_level;

    // Deferred so brick/drop spawning doesn't fight the ball borrow
    let mut destroyed: Vec<(u32, Vec2, bool)> = Vec::new();
    let mut awards: Vec<(u64, u32, Vec2)> = Vec::new();
    let mut lost = 0usize;

    let mut balls = std::mem::take(&mut state.balls);
    balls.retain_mut(|ball| {
        if !ball.launched {
            return true;
        }

        ball.pos += ball.vel * multiplier * dt;

        // 1. Walls
        for _wall in resolve_walls(&mut ball.pos, &mut ball.vel, ball.radius, FIELD_WIDTH) {
            events.push(GameEvent::Sound(SoundCue::WallHit));
            events.push(GameEvent::Haptic { ms: 8 });
        }

        // 2. Bottom exit
        if ball.pos.y > FIELD_HEIGHT {
            lost += 1;
            return false;
        }

        // 3. Paddle (only while falling)
        if ball.vel.y > 0.0 && circle_rect_overlap(ball.pos, ball.radius, &paddle_rect) {
            ball.vel = paddle_bounce(
                ball.vel,
                ball.pos.x,
                state.paddle.x,
                state.paddle.width,
                state.tuning.paddle_steer,
                state.tuning.min_vertical_share,
            );
            if accelerate {
                let speed = ball.speed();
                let boosted = (speed * (1.0 + state.tuning.bounce_accel)).min(max_speed.max(speed));
                ball.vel = ball.vel.normalize_or_zero() * boosted;
            }
            ball.pos.y = paddle_rect.min.y - ball.radius;
            state.paddle_bounces += 1;
            events.push(GameEvent::Sound(SoundCue::PaddleHit));
            events.push(GameEvent::Haptic { ms: 12 });
        }

        // 4. Bricks: first overlap only
        let pos = ball.pos;
        let radius = ball.radius;
        if let Some(brick) = state
            .bricks
            .iter_mut()
            .find(|b| b.alive && circle_rect_overlap(pos, radius, &b.rect()))
        {
            let contact = ball_rect_collision(ball.pos, ball.radius, &brick.rect());
            if contact.hit {
                ball.vel = bounce_off(ball.vel, contact.normal);
                ball.pos += contact.normal * contact.penetration;
            }

            brick.hp = brick.hp.saturating_sub(1);
            let combo = state.combo.register_hit(now_ms, state.tuning.combo_window_ms);
            let killed = brick.hp == 0;
            let points = hit_award(killed, brick.is_reinforced(), combo, &state.tuning);
            awards.push((points, combo, brick.center()));

            if killed {
                brick.alive = false;
                destroyed.push((brick.id, brick.center(), brick.is_reinforced()));
                events.push(GameEvent::BrickDestroyed { id: brick.id });
                events.push(GameEvent::Sound(SoundCue::BrickBreak));
                events.push(GameEvent::Haptic { ms: 15 });
            } else {
                events.push(GameEvent::Sound(SoundCue::BrickHit));
            }
        }

        true
    });
    state.balls = balls;

    for (points, combo, at) in awards {
        state.add_score(points);
        events.push(GameEvent::ScoreChanged {
            score: state.score,
            delta: points,
        });
        if combo > 1 {
            events.push(GameEvent::ComboChanged { combo });
        }
        let text = if combo > 1 {
            format!("+{} x{}", points, combo)
        } else {
            format!("+{}", points)
        };
        push_float_text(state, at, text);
    }

    for (id, center, reinforced) in destroyed {
        spawn_burst(state, center, id, if reinforced { 2 } else { 1 }, 10);
        if let Some(kind) = roll_drop(&mut state.rng, &state.tuning) {
            spawn_drop(state, kind, center);
            events.push(GameEvent::DropSpawned { kind });
        }
    }

    if lost > 0 {
        events.push(GameEvent::BallLost {
            remaining: state.balls.len(),
        });
    }
}

fn step_drops(state: &mut MatchState, dt: f32, now_ms: f64, events: &mut Vec<GameEvent>) {
    let paddle_rect = state.paddle.rect();
    let mut caught = Vec::new();

    for drop in state.drops.iter_mut().filter(|d| d.alive) {
        drop.pos += drop.vel * dt;
        if circle_rect_overlap(drop.pos, drop.radius, &paddle_rect) {
            drop.alive = false;
            caught.push(drop.kind);
        } else if drop.pos.y - drop.radius > FIELD_HEIGHT {
            drop.alive = false;
        }
    }
    state.drops.retain(|d| d.alive);

    for kind in caught {
        events.extend(apply_power_up(state, kind, now_ms));
        let at = Vec2::new(state.paddle.x, state.paddle.top());
        push_float_text(state, at, kind.label().to_string());
    }
}

/// Particles and float texts; purely visual
fn step_cosmetics(state: &mut MatchState, dt: f32) {
    for particle in state.particles.iter_mut() {
        particle.pos += particle.vel * dt;
        // Gravity and drag
        particle.vel.y += 420.0 * dt;
        particle.vel *= 0.985;
        particle.life -= dt;
        particle.size *= 0.99;
    }
    state.particles.retain(|p| {
        p.life > 0.0 && p.pos.x >= 0.0 && p.pos.x <= FIELD_WIDTH && p.pos.y <= FIELD_HEIGHT
    });

    for text in state.float_texts.iter_mut() {
        text.pos += text.vel * dt;
        text.life -= dt;
    }
    state.float_texts.retain(|t| t.life > 0.0 && t.pos.y >= 0.0);
}

fn lose_life(state: &mut MatchState, events: &mut Vec<GameEvent>) {
    state.combo.reset();
    state.drops.clear();
    events.push(GameEvent::Sound(SoundCue::LifeLost));
    events.push(GameEvent::Haptic { ms: 40 });

    match state.lives {
        None => {
            events.push(GameEvent::LifeLost { lives_left: None });
            state.serve_ball();
        }
        Some(lives) => {
            let left = lives.saturating_sub(1);
            state.lives = Some(left);
            events.push(GameEvent::LifeLost {
                lives_left: Some(left),
            });
            if left == 0 {
                enter_game_over(state, events);
            } else {
                state.serve_ball();
            }
        }
    }
}

fn enter_game_over(state: &mut MatchState, events: &mut Vec<GameEvent>) {
    state.phase = GamePhase::GameOver;
    if state.terminal_emitted {
        return;
    }
    state.terminal_emitted = true;
    log::info!("Game over on level {} with {} points", state.level, state.score);
    events.push(GameEvent::Sound(SoundCue::GameOver));
    events.push(GameEvent::GameOver {
        level: state.level,
        score: state.score,
    });
}

fn enter_win(state: &mut MatchState, events: &mut Vec<GameEvent>) {
    state.phase = GamePhase::Win;
    for ball in &mut state.balls {
        ball.vel = Vec2::ZERO;
    }
    state.drops.clear();
    if state.terminal_emitted {
        return;
    }
    state.terminal_emitted = true;

    // Celebration ring from the middle of the field
    let center = Vec2::new(FIELD_WIDTH / 2.0, FIELD_HEIGHT / 3.0);
    spawn_burst(state, center, state.level.wrapping_mul(2654435761), 100, 40);

    log::info!("Level {} cleared with {} points", state.level, state.score);
    events.push(GameEvent::Sound(SoundCue::LevelClear));
    events.push(GameEvent::Haptic { ms: 60 });
    events.push(GameEvent::LevelCleared {
        level: state.level,
        score: state.score,
    });
}

/// Hash-jittered particle burst (keeps the gameplay RNG untouched)
fn spawn_burst(state: &mut MatchState, at: Vec2, salt: u32, color: u32, count: u32) {
    let seed = (state.frame as u32).wrapping_add(salt);
    for i in 0..count {
        if state.particles.len() >= MAX_PARTICLES {
            state.particles.remove(0);
        }
        let hash = seed.wrapping_mul(2654435761).wrapping_add(i.wrapping_mul(7919));
        let rand1 = (hash % 1000) as f32 / 1000.0;
        let rand2 = ((hash >> 10) % 1000) as f32 / 1000.0;

        let angle = std::f32::consts::TAU * (i as f32 / count as f32) + rand1 * 0.5;
        let speed = 80.0 + rand2 * 160.0;
        state.particles.push(Particle {
            pos: at,
            vel: Vec2::from_angle(angle) * speed,
            color,
            life: 0.5 + rand1 * 0.4,
            size: 2.0 + rand2 * 2.5,
        });
    }
}

fn push_float_text(state: &mut MatchState, at: Vec2, text: String) {
    if state.float_texts.len() >= MAX_FLOAT_TEXTS {
        state.float_texts.remove(0);
    }
    state.float_texts.push(FloatText {
        pos: at,
        vel: Vec2::new(0.0, -40.0),
        life: 0.9,
        text,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::level::generate_from_seed;
    use crate::sim::state::{Brick, PowerUpKind};
    use crate::tuning::Tuning;

    const DT: f32 = 1.0 / 60.0;

    fn one_brick_state() -> MatchState {
        let brick = Brick::new(1, Vec2::new(160.0, 100.0), Vec2::new(40.0, 18.0), 1);
        let tuning = Tuning {
            drop_chance: 0.0,
            ..Tuning::default()
        };
        MatchState::new(1, 99, vec![brick], tuning, Some(3))
    }

    #[test]
    fn test_start_launches() {
        let mut state = one_brick_state();
        let events = start(&mut state);
        assert_eq!(state.phase, GamePhase::Running);
        assert!(state.balls[0].launched);
        assert!(state.balls[0].vel.y < 0.0);
        assert!(events.contains(&GameEvent::Launched));
    }

    #[test]
    fn test_idle_does_not_move() {
        let mut state = one_brick_state();
        let before = state.balls[0].pos;
        let events = step(&mut state, &StepInput::default(), DT, 0.0);
        assert!(events.is_empty());
        assert_eq!(state.phase, GamePhase::Idle);
        assert_eq!(state.balls[0].pos, before);
    }

    #[test]
    fn test_pause_freezes_everything() {
        let mut state = one_brick_state();
        start(&mut state);
        state.particles.push(Particle {
            pos: Vec2::new(100.0, 100.0),
            vel: Vec2::new(10.0, 0.0),
            color: 1,
            life: 1.0,
            size: 2.0,
        });

        let pause = StepInput {
            pause: true,
            ..Default::default()
        };
        let events = step(&mut state, &pause, DT, 0.0);
        assert_eq!(events, vec![GameEvent::Paused]);
        assert_eq!(state.phase, GamePhase::Paused);

        let ball = state.balls[0].pos;
        let particle = state.particles[0].pos;
        step(&mut state, &StepInput::default(), DT, 16.0);
        assert_eq!(state.balls[0].pos, ball);
        assert_eq!(state.particles[0].pos, particle);

        let events = step(&mut state, &pause, DT, 32.0);
        assert_eq!(events.first(), Some(&GameEvent::Resumed));
        assert_eq!(state.phase, GamePhase::Running);
    }

    #[test]
    fn test_dt_is_capped() {
        let mut state = one_brick_state();
        start(&mut state);
        let before = state.balls[0].pos;
        let speed = state.balls[0].speed();
        step(&mut state, &StepInput::default(), 2.0, 0.0);
        let moved = state.balls[0].pos.distance(before);
        assert!(moved <= speed * MAX_DT + 1e-3);
    }

    #[test]
    fn test_bottom_exit_costs_a_life() {
        let mut state = one_brick_state();
        start(&mut state);
        state.balls[0].pos = Vec2::new(20.0, FIELD_HEIGHT + 1.0);
        state.balls[0].vel = Vec2::new(0.0, 300.0);

        let events = step(&mut state, &StepInput::default(), DT, 0.0);
        assert_eq!(state.lives, Some(2));
        assert_eq!(state.phase, GamePhase::Running);
        assert!(events.contains(&GameEvent::LifeLost { lives_left: Some(2) }));
        // A new ball is served on the paddle
        assert_eq!(state.balls.len(), 1);
        assert!(!state.balls[0].launched);
    }

    #[test]
    fn test_last_life_is_game_over_once() {
        let mut state = one_brick_state();
        state.lives = Some(1);
        start(&mut state);
        state.balls[0].pos = Vec2::new(20.0, FIELD_HEIGHT + 1.0);
        state.balls[0].vel = Vec2::new(0.0, 300.0);

        let events = step(&mut state, &StepInput::default(), DT, 0.0);
        assert_eq!(state.phase, GamePhase::GameOver);
        assert_eq!(state.lives, Some(0));
        let overs = events
            .iter()
            .filter(|e| matches!(e, GameEvent::GameOver { .. }))
            .count();
        assert_eq!(overs, 1);

        // Terminal phase ignores further frames
        assert!(step(&mut state, &StepInput::default(), DT, 16.0).is_empty());
    }

    #[test]
    fn test_unlimited_lives_keep_serving() {
        let mut state = one_brick_state();
        state.lives = None;
        start(&mut state);
        for i in 0..5 {
            state.balls.iter_mut().for_each(|b| {
                b.launched = true;
                b.pos = Vec2::new(20.0, FIELD_HEIGHT + 5.0);
                b.vel = Vec2::new(0.0, 100.0);
            });
            step(&mut state, &StepInput::default(), DT, i as f64 * 16.0);
            assert_eq!(state.phase, GamePhase::Running);
            assert_eq!(state.lives, None);
        }
    }

    #[test]
    fn test_brick_hit_destroys_and_wins() {
        let mut state = one_brick_state();
        start(&mut state);
        // Ball just under the brick, moving up
        state.balls[0].pos = Vec2::new(180.0, 124.0);
        state.balls[0].vel = Vec2::new(0.0, -300.0);

        let events = step(&mut state, &StepInput::default(), DT, 0.0);
        assert!(!state.bricks[0].alive);
        assert_eq!(state.score, 50);
        assert_eq!(state.phase, GamePhase::Win);
        assert!(events.contains(&GameEvent::LevelCleared { level: 1, score: 50 }));
        assert!(state.balls.iter().all(|b| b.vel == Vec2::ZERO));
        assert!(!state.particles.is_empty());
    }

    #[test]
    fn test_reinforced_brick_takes_two_hits() {
        let brick = Brick::new(1, Vec2::new(160.0, 100.0), Vec2::new(40.0, 18.0), 2);
        let mut state = MatchState::new(1, 3, vec![brick], Tuning::default(), Some(3));
        start(&mut state);
        state.balls[0].pos = Vec2::new(180.0, 124.0);
        state.balls[0].vel = Vec2::new(0.0, -300.0);

        step(&mut state, &StepInput::default(), DT, 0.0);
        assert!(state.bricks[0].alive);
        assert_eq!(state.bricks[0].hp, 1);
        assert_eq!(state.score, 10);
        // Bounced downward
        assert!(state.balls[0].vel.y > 0.0);
        assert_eq!(state.phase, GamePhase::Running);
    }

    #[test]
    fn test_one_brick_per_ball_per_frame() {
        // Two overlapping bricks under the same ball
        let a = Brick::new(1, Vec2::new(160.0, 100.0), Vec2::new(40.0, 18.0), 1);
        let b = Brick::new(2, Vec2::new(160.0, 110.0), Vec2::new(40.0, 18.0), 1);
        let mut state = MatchState::new(1, 3, vec![a, b], Tuning::default(), Some(3));
        start(&mut state);
        state.balls[0].pos = Vec2::new(180.0, 120.0);
        state.balls[0].vel = Vec2::new(0.0, -10.0);

        step(&mut state, &StepInput::default(), DT, 0.0);
        assert_eq!(state.alive_bricks(), 1);
    }

    #[test]
    fn test_paddle_bounce_sends_ball_up() {
        let mut state = one_brick_state();
        start(&mut state);
        let paddle_x = state.paddle.x;
        state.balls[0].pos = Vec2::new(paddle_x + 10.0, PADDLE_Y - 10.0);
        state.balls[0].vel = Vec2::new(50.0, 280.0);
        let speed = state.balls[0].speed();

        let events = step(&mut state, &StepInput::default(), DT, 0.0);
        assert!(state.balls[0].vel.y < 0.0);
        assert!((state.balls[0].speed() - speed).abs() < 1e-2);
        assert!(events.contains(&GameEvent::Sound(SoundCue::PaddleHit)));
        assert_eq!(state.paddle_bounces, 1);
    }

    #[test]
    fn test_rising_ball_passes_paddle() {
        let mut state = one_brick_state();
        start(&mut state);
        let paddle_x = state.paddle.x;
        state.balls[0].pos = Vec2::new(paddle_x, PADDLE_Y);
        state.balls[0].vel = Vec2::new(0.0, -280.0);
        step(&mut state, &StepInput::default(), DT, 0.0);
        assert_eq!(state.paddle_bounces, 0);
        assert!(state.balls[0].vel.y < 0.0);
    }

    #[test]
    fn test_drop_caught_and_missed() {
        let mut state = one_brick_state();
        start(&mut state);
        let paddle_x = state.paddle.x;
        spawn_drop(&mut state, PowerUpKind::Widen, Vec2::new(paddle_x, PADDLE_Y - 12.0));
        spawn_drop(&mut state, PowerUpKind::Slow, Vec2::new(10.0, FIELD_HEIGHT + 20.0));

        let events = step(&mut state, &StepInput::default(), DT, 500.0);
        assert!(state.drops.is_empty());
        assert_eq!(state.paddle.width, state.tuning.widen_width);
        assert!(events.contains(&GameEvent::PowerUpApplied {
            kind: PowerUpKind::Widen
        }));
        assert!(!state.effects.slow_active());
    }

    #[test]
    fn test_pause_holds_effect_deadlines() {
        let mut state = one_brick_state();
        start(&mut state);
        state.balls[0].pos = Vec2::new(50.0, 300.0);
        state.balls[0].vel = Vec2::new(0.0, -10.0);
        apply_power_up(&mut state, PowerUpKind::Widen, 0.0);
        let widen_ms = state.tuning.widen_ms;

        let pause = StepInput {
            pause: true,
            ..Default::default()
        };
        step(&mut state, &pause, DT, 16.0);
        let events = step(&mut state, &pause, DT, 16.0 + 3.0 * widen_ms);
        assert_eq!(events.first(), Some(&GameEvent::Resumed));
        assert!(!events.iter().any(|e| matches!(e, GameEvent::EffectExpired { .. })));
        assert_eq!(state.paddle.width, state.tuning.widen_width);
        assert_eq!(state.effects.widen_until, Some(widen_ms * 4.0));

        // Expires once the unpaused time adds up
        step(&mut state, &StepInput::default(), DT, widen_ms * 4.0);
        assert_eq!(state.paddle.width, PADDLE_WIDTH);
    }

    #[test]
    fn test_effect_expiry_runs_before_physics() {
        let mut state = one_brick_state();
        start(&mut state);
        state.effects.slow_until = Some(100.0);
        state.balls[0].pos = Vec2::new(50.0, 300.0);
        state.balls[0].vel = Vec2::new(0.0, -300.0);

        step(&mut state, &StepInput::default(), DT, 100.0);
        // Full speed this frame: slow expired first
        assert!((state.balls[0].pos.y - (300.0 - 300.0 * DT)).abs() < 1e-3);
    }

    #[test]
    fn test_whole_level_clears_with_autopilot() {
        let tuning = Tuning {
            drop_chance: 0.0,
            ..Tuning::default()
        };
        let bricks = generate_from_seed(1, 1234, &tuning);
        let mut state = MatchState::new(1, 1234, bricks, tuning, None);
        start(&mut state);

        let mut now = 0.0;
        let mut last_score = 0;
        for frame in 0..60 * 1200 {
            // Vary the contact offset so the ball fans out across columns
            let offset = 24.0 * (frame as f32 / 97.0).sin();
            let target = state.balls.first().map(|b| b.pos.x + offset);
            let input = StepInput {
                pointer_x: target,
                dragging: true,
                launch: true,
                pause: false,
            };
            step(&mut state, &input, DT, now);
            now += 1000.0 / 60.0;
            assert!(state.score >= last_score);
            last_score = state.score;
            if state.phase == GamePhase::Win {
                break;
            }
        }
        assert_eq!(state.phase, GamePhase::Win);
        assert_eq!(state.alive_bricks(), 0);
    }
}
