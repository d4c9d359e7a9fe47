//! Time utility functions

use std::time::{Duration, Instant};

/// Measures how long an outbound call takes
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    started: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Convert duration to milliseconds
pub fn duration_to_ms(duration: Duration) -> u64 {
    duration.as_millis() as u64
}
