use std::time::Duration;

use tokio::time::Instant;

/// Events-per-second over fixed, back-to-back windows.
///
/// The count resets at every window boundary, so the rate reflects the last
/// window only, not the whole run.
#[derive(Debug)]
pub struct RateWindow {
    window: Duration,
    started_at: Instant,
    count: u64,
}

impl RateWindow {
    pub fn new(now: Instant, window: Duration) -> Self {
        Self {
            window,
            started_at: now,
            count: 0,
        }
    }

    pub fn record(&mut self) {
        self.count += 1;
    }

    /// Closes the window if it has elapsed and returns its rate.
    pub fn roll(&mut self, now: Instant) -> Option<f64> {
        let elapsed = now.saturating_duration_since(self.started_at);
        if elapsed < self.window {
            return None;
        }
        let rate = self.count as f64 / elapsed.as_secs_f64();
        self.count = 0;
        self.started_at = now;
        Some(rate)
    }
}
