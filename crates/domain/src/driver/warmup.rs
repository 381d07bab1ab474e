use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Readiness gate of a sensor after power-on.
///
/// `is_ready_at(now)` is `now - start >= duration`, latched: once it has
/// returned `true` it keeps returning `true` for any later `now`.
#[derive(Debug)]
pub struct WarmupState {
    started_at: Instant,
    duration: Duration,
    latched: AtomicBool,
}

impl WarmupState {
    pub fn start(now: Instant, duration: Duration) -> Self {
        Self {
            started_at: now,
            duration,
            latched: AtomicBool::new(duration.is_zero()),
        }
    }

    pub fn is_ready_at(&self, now: Instant) -> bool {
        if self.latched.load(Ordering::Acquire) {
            return true;
        }
        let elapsed = now.checked_duration_since(self.started_at);
        match elapsed {
            Some(elapsed) if elapsed >= self.duration => {
                self.latched.store(true, Ordering::Release);
                true
            }
            _ => false,
        }
    }
}
