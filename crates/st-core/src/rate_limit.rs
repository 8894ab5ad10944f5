//! Fixed-window request governor for the chart endpoint.
//!
//! One counter for the whole process: the window opens at construction,
//! admits up to `max_requests` calls, and is reopened by the first call
//! that arrives after it has closed.

use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Process-wide fixed-window rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    state: Mutex<Window>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self::starting_at(max_requests, window, Instant::now())
    }

    fn starting_at(max_requests: u32, window: Duration, now: Instant) -> Self {
        Self {
            max_requests,
            window,
            state: Mutex::new(Window {
                count: 0,
                reset_at: now + window,
            }),
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Admit or deny one request at the current instant.
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    /// Admit or deny one request at `now`.
    pub fn allow_at(&self, now: Instant) -> bool {
        // Counter updates stay consistent even if a holder panicked.
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if now > state.reset_at {
            state.count = 0;
            state.reset_at = now + self.window;
        }

        if state.count < self.max_requests {
            state.count += 1;
            true
        } else {
            debug!(count = state.count, max = self.max_requests, "request rate limited");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn sixth_request_in_window_is_denied() {
        let t0 = Instant::now();
        let limiter = RateLimiter::starting_at(5, Duration::from_secs(10), t0);
        for i in 0..5 {
            assert!(limiter.allow_at(t0 + Duration::from_millis(i * 100)), "call {i}");
        }
        assert!(!limiter.allow_at(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn window_reopens_after_expiry() {
        let t0 = Instant::now();
        let limiter = RateLimiter::starting_at(5, Duration::from_secs(10), t0);
        for _ in 0..6 {
            limiter.allow_at(t0);
        }
        let later = t0 + Duration::from_secs(11);
        assert!(limiter.allow_at(later));
        // The counter was reset, so four more fit in the new window.
        for _ in 0..4 {
            assert!(limiter.allow_at(later));
        }
        assert!(!limiter.allow_at(later + Duration::from_secs(1)));
    }

    #[test]
    fn boundary_instant_is_still_inside_window() {
        let t0 = Instant::now();
        let window = Duration::from_secs(10);
        let limiter = RateLimiter::starting_at(1, window, t0);
        assert!(limiter.allow_at(t0));
        assert!(!limiter.allow_at(t0 + window));
    }

    #[test]
    fn concurrent_callers_share_one_budget() {
        let limiter = Arc::new(RateLimiter::new(20, Duration::from_secs(60)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                thread::spawn(move || (0..10).filter(|_| limiter.allow()).count())
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 20);
    }
}
