//! Sound and haptic feedback
//!
//! The engine only emits [`SoundCue`]s and haptic requests; a
//! [`FeedbackSink`] turns them into noise. Sinks are fire-and-forget and
//! can never fail a frame.

use crate::sim::{GameEvent, SoundCue};

pub trait FeedbackSink {
    fn play(&mut self, cue: SoundCue);
    fn vibrate(&mut self, ms: u32);
    fn set_muted(&mut self, muted: bool);
}

/// Forward the feedback-carrying events of one frame to a sink
pub fn dispatch(sink: &mut dyn FeedbackSink, events: &[GameEvent]) {
    for event in events {
        match event {
            GameEvent::Sound(cue) => sink.play(*cue),
            GameEvent::Haptic { ms } => sink.vibrate(*ms),
            _ => {}
        }
    }
}

/// Discards everything (native builds, tests, muted devices)
#[derive(Debug, Default)]
pub struct NullFeedback;

impl FeedbackSink for NullFeedback {
    fn play(&mut self, _cue: SoundCue) {}
    fn vibrate(&mut self, _ms: u32) {}
    fn set_muted(&mut self, _muted: bool) {}
}

/// One oscillator voice: frequency sweep under a decaying envelope
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub wave: Wave,
    pub freq: f32,
    /// Sweep target; equal to `freq` for a steady pitch
    pub end_freq: f32,
    /// Start offset (s)
    pub delay: f64,
    /// Length (s)
    pub duration: f64,
    /// Peak gain before master volume
    pub gain: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wave {
    Sine,
    Square,
    Triangle,
    Sawtooth,
}

const fn tone(wave: Wave, freq: f32, end_freq: f32, delay: f64, duration: f64, gain: f32) -> Tone {
    Tone {
        wave,
        freq,
        end_freq,
        delay,
        duration,
        gain,
    }
}

/// Voices making up a cue
pub fn voices(cue: SoundCue) -> &'static [Tone] {
    use Wave::*;
    match cue {
        SoundCue::WallHit => const { &[tone(Sine, 400.0, 400.0, 0.0, 0.08, 0.3)] },
        SoundCue::PaddleHit => const { &[tone(Sine, 150.0, 60.0, 0.0, 0.1, 0.6)] },
        SoundCue::BrickHit => const { &[tone(Triangle, 300.0, 220.0, 0.0, 0.06, 0.35)] },
        SoundCue::BrickBreak => const { &[
            tone(Square, 520.0, 260.0, 0.0, 0.09, 0.25),
            tone(Sine, 90.0, 50.0, 0.0, 0.12, 0.35),
        ] },
        SoundCue::PowerUp => const { &[
            tone(Sine, 600.0, 600.0, 0.0, 0.12, 0.3),
            tone(Sine, 800.0, 800.0, 0.08, 0.12, 0.3),
            tone(Sine, 1000.0, 1000.0, 0.16, 0.15, 0.3),
        ] },
        SoundCue::Launch => const { &[tone(Triangle, 200.0, 600.0, 0.0, 0.15, 0.35)] },
        SoundCue::LifeLost => const { &[tone(Sawtooth, 300.0, 80.0, 0.0, 0.4, 0.3)] },
        SoundCue::LevelClear => const { &[
            tone(Triangle, 523.0, 523.0, 0.0, 0.15, 0.3),
            tone(Triangle, 659.0, 659.0, 0.1, 0.15, 0.3),
            tone(Triangle, 784.0, 784.0, 0.2, 0.15, 0.3),
            tone(Triangle, 1047.0, 1047.0, 0.3, 0.3, 0.35),
        ] },
        SoundCue::GameOver => const { &[
            tone(Sine, 392.0, 392.0, 0.0, 0.25, 0.35),
            tone(Sine, 330.0, 330.0, 0.2, 0.25, 0.35),
            tone(Sine, 262.0, 200.0, 0.4, 0.5, 0.35),
        ] },
    }
}

#[cfg(target_arch = "wasm32")]
pub use web::WebFeedback;

#[cfg(target_arch = "wasm32")]
mod web {
    use web_sys::{AudioContext, GainNode, OscillatorNode, OscillatorType};

    use super::{FeedbackSink, Tone, Wave, voices};
    use crate::sim::SoundCue;

    /// Web Audio oscillators plus `navigator.vibrate`
    pub struct WebFeedback {
        ctx: Option<AudioContext>,
        volume: f32,
        muted: bool,
        haptics: bool,
    }

    impl WebFeedback {
        pub fn new(volume: f32, muted: bool, haptics: bool) -> Self {
            // May fail outside a secure context
            let ctx = AudioContext::new().ok();
            if ctx.is_none() {
                log::warn!("Failed to create AudioContext - audio disabled");
            }
            Self {
                ctx,
                volume: volume.clamp(0.0, 1.0),
                muted,
                haptics,
            }
        }

        /// Resume audio context (required after user gesture)
        pub fn resume(&self) {
            if let Some(ctx) = &self.ctx {
                let _ = ctx.resume();
            }
        }

        pub fn set_volume(&mut self, volume: f32) {
            self.volume = volume.clamp(0.0, 1.0);
        }

        fn create_osc(ctx: &AudioContext, voice: &Tone) -> Option<(OscillatorNode, GainNode)> {
            let osc = ctx.create_oscillator().ok()?;
            let gain = ctx.create_gain().ok()?;

            osc.set_type(match voice.wave {
                Wave::Sine => OscillatorType::Sine,
                Wave::Square => OscillatorType::Square,
                Wave::Triangle => OscillatorType::Triangle,
                Wave::Sawtooth => OscillatorType::Sawtooth,
            });
            osc.frequency().set_value(voice.freq);
            osc.connect_with_audio_node(&gain).ok()?;
            gain.connect_with_audio_node(&ctx.destination()).ok()?;

            Some((osc, gain))
        }

        fn play_voice(ctx: &AudioContext, voice: &Tone, vol: f32) {
            let Some((osc, gain)) = Self::create_osc(ctx, voice) else {
                return;
            };
            let t = ctx.current_time() + voice.delay;
            let end = t + voice.duration;

            gain.gain().set_value_at_time(vol * voice.gain, t).ok();
            gain.gain().exponential_ramp_to_value_at_time(0.01, end).ok();
            if voice.end_freq != voice.freq {
                osc.frequency().set_value_at_time(voice.freq, t).ok();
                osc.frequency()
                    .exponential_ramp_to_value_at_time(voice.end_freq, end)
                    .ok();
            }

            osc.start_with_when(t).ok();
            osc.stop_with_when(end + 0.05).ok();
        }
    }

    impl FeedbackSink for WebFeedback {
        fn play(&mut self, cue: SoundCue) {
            if self.muted || self.volume <= 0.0 {
                return;
            }
            let Some(ctx) = &self.ctx else { return };

            // Browsers suspend the context until a user gesture
            if ctx.state() == web_sys::AudioContextState::Suspended {
                let _ = ctx.resume();
            }
            for voice in voices(cue) {
                Self::play_voice(ctx, voice, self.volume);
            }
        }

        fn vibrate(&mut self, ms: u32) {
            if !self.haptics {
                return;
            }
            if let Some(window) = web_sys::window() {
                let _ = window.navigator().vibrate_with_duration(ms);
            }
        }

        fn set_muted(&mut self, muted: bool) {
            self.muted = muted;
        }
    }
}
