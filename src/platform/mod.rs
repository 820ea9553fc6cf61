//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Time (frame clock in milliseconds)
//! - Storage (LocalStorage on web)

#[cfg(target_arch = "wasm32")]
mod web;

#[cfg(target_arch = "wasm32")]
pub use web::{LocalStorageStore, now_ms, wall_clock_ms};

/// Milliseconds since the first call; monotonic
#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> f64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_secs_f64() * 1000.0
}

/// Unix time in milliseconds, for timestamps that outlive a session
#[cfg(not(target_arch = "wasm32"))]
pub fn wall_clock_ms() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64
}
