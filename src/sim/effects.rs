//! Power-up drops and timed effects
//!
//! Timers are absolute deadlines on the caller's clock. The frame loop must
//! call [`update_effect_timers`] before any collision work so a single frame
//! never applies and reverts the same effect.

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;

use super::state::{Ball, GameEvent, MatchState, PowerUpDrop, PowerUpKind, SoundCue};
use crate::consts::*;
use crate::tuning::Tuning;

/// Roll for a drop when a brick is destroyed; `None` most of the time
pub fn roll_drop(rng: &mut Pcg32, tuning: &Tuning) -> Option<PowerUpKind> {
    let chance: f32 = rng.random();
    if chance >= tuning.drop_chance {
        return None;
    }

    let weights = tuning.drop_weights;
    let total = weights.total();
    if total == 0 {
        return None;
    }
    let pick = rng.random_range(0..total);
    let kind = if pick < weights.widen {
        PowerUpKind::Widen
    } else if pick < weights.widen + weights.slow {
        PowerUpKind::Slow
    } else {
        PowerUpKind::Multiball
    };
    Some(kind)
}

/// Spawn a falling drop at a brick center
pub fn spawn_drop(state: &mut MatchState, kind: PowerUpKind, at: Vec2) {
    let id = state.next_entity_id();
    let fall = state.tuning.drop_fall_speed;
    state.drops.push(PowerUpDrop {
        id,
        kind,
        pos: at,
        vel: Vec2::new(0.0, fall),
        radius: DROP_RADIUS,
        alive: true,
    });
}

/// Apply a caught power-up
///
/// Timed effects refresh their deadline instead of stacking. Multiball is
/// instantaneous and silently capped at `max_balls`.
pub fn apply_power_up(state: &mut MatchState, kind: PowerUpKind, now_ms: f64) -> Vec<GameEvent> {
    let mut events = Vec::new();

    match kind {
        PowerUpKind::Widen => {
            state.effects.widen_until = Some(now_ms + state.tuning.widen_ms);
            state.paddle.width = state.tuning.widen_width;
            state.paddle.clamp_to_field();
        }
        PowerUpKind::Slow => {
            state.effects.slow_until = Some(now_ms + state.tuning.slow_ms);
        }
        PowerUpKind::Multiball => {
            let cap = state.tuning.max_balls;
            if state.balls.len() >= cap {
                events.push(GameEvent::Notice("Max balls!".to_string()));
                return events;
            }
            spawn_multiball(state, cap);
        }
    }

    log::debug!("Power-up applied: {:?}", kind);
    events.push(GameEvent::PowerUpApplied { kind });
    events.push(GameEvent::Sound(SoundCue::PowerUp));
    events.push(GameEvent::Haptic { ms: 20 });
    events
}

/// Clone the lead ball at ±spread until the ball cap is reached
fn spawn_multiball(state: &mut MatchState, cap: usize) {
    let source = state
        .balls
        .iter()
        .find(|b| b.launched)
        .or_else(|| state.balls.first())
        .cloned();
    let Some(source) = source else { return };

    // Unlaunched sources get a straight-up velocity so clones can leave
    let vel = if source.vel.length_squared() > 0.0 {
        source.vel
    } else {
        Vec2::new(0.0, -state.tuning.level_speed(state.level))
    };

    let spread = state.tuning.multiball_spread;
    for angle in [spread, -spread] {
        if state.balls.len() >= cap {
            break;
        }
        let id = state.next_entity_id();
        state.balls.push(Ball {
            id,
            pos: source.pos,
            vel: Vec2::from_angle(angle).rotate(vel),
            radius: source.radius,
            launched: true,
        });
    }
}

/// Revert every effect whose deadline has passed
pub fn update_effect_timers(state: &mut MatchState, now_ms: f64) -> Vec<GameEvent> {
    let mut events = Vec::new();

    if state.effects.widen_until.is_some_and(|until| now_ms >= until) {
        state.effects.widen_until = None;
        state.paddle.width = PADDLE_WIDTH;
        state.paddle.clamp_to_field();
        events.push(GameEvent::EffectExpired {
            kind: PowerUpKind::Widen,
        });
    }

    if state.effects.slow_until.is_some_and(|until| now_ms >= until) {
        state.effects.slow_until = None;
        events.push(GameEvent::EffectExpired {
            kind: PowerUpKind::Slow,
        });
    }

    events
}
