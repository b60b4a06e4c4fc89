use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_millis(1000);

#[derive(Debug)]
struct Window {
    start: Instant,
    count: usize,
}

/// Fixed one-second window admission counter.
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: Mutex<Window>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(max_per_second: usize) -> Self {
        Self {
            limit: max_per_second,
            window: Mutex::new(Window {
                start: Instant::now(),
                count: 0,
            }),
        }
    }

    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Admits the caller if the current window still has room.
    pub fn allow(&self) -> bool {
        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        if now.duration_since(window.start) >= WINDOW {
            window.start = now;
            window.count = 0;
        }
        if window.count >= self.limit {
            return false;
        }
        window.count += 1;
        true
    }

    pub fn reset(&self) {
        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
        window.start = Instant::now();
        window.count = 0;
    }
}
