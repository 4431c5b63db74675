//! Sliding-window rate limiter for the content-extraction service
//!
//! Callers never see a rate-limit error: when the window is full,
//! `wait_for_slot` parks until the oldest recorded call ages out.
//! Timing goes through `tokio::time`, so tests can drive it with a paused clock.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Allows at most `max_calls` calls within any rolling `window`
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_calls: usize,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    /// Creates a limiter; `max_calls` of zero is treated as one
    pub fn new(max_calls: u32, window: Duration) -> Self {
        let max_calls = max_calls.max(1) as usize;
        Self {
            max_calls,
            window,
            calls: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    /// Waits until a call may be made, then records it
    pub async fn wait_for_slot(&self) {
        loop {
            let wait = {
                let mut calls = self.calls.lock().await;
                let now = Instant::now();

                while let Some(oldest) = calls.front() {
                    if now.saturating_duration_since(*oldest) >= self.window {
                        calls.pop_front();
                    } else {
                        break;
                    }
                }

                if calls.len() < self.max_calls {
                    calls.push_back(now);
                    return;
                }

                match calls.front() {
                    Some(oldest) => (*oldest + self.window).saturating_duration_since(now),
                    None => Duration::ZERO,
                }
            };

            tracing::debug!(
                "Extraction budget exhausted, waiting {:.1}s for a free slot",
                wait.as_secs_f64()
            );
            tokio::time::sleep(wait).await;
        }
    }
}
