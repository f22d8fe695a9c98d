// Client-side request budget for the timeline API.
//
// User-timeline endpoints allow roughly 900 requests per 15-minute window.
// A sliding window of request timestamps keeps us under that, and a minimum
// spacing keeps one cycle over many accounts from bursting. Hitting the
// server-side limit anyway is reported as FetchError::RateLimited and
// handled by the poller; this limiter only avoids getting there.

use std::collections::VecDeque;

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::info;

/// Requests allowed per window by default.
pub const DEFAULT_MAX_REQUESTS: u32 = 900;

/// Default sliding window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Default spacing between consecutive requests.
pub const DEFAULT_MIN_SPACING: Duration = Duration::from_millis(250);

pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    min_spacing: Duration,
    sent: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration, min_spacing: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            min_spacing,
            sent: Mutex::new(VecDeque::new()),
        }
    }

    /// Wait until another request fits in the budget, then record it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut sent = self.sent.lock().await;
                let now = Instant::now();

                while let Some(&oldest) = sent.front() {
                    if now.duration_since(oldest) >= self.window {
                        sent.pop_front();
                    } else {
                        break;
                    }
                }

                let spacing_wait = sent
                    .back()
                    .map(|&last| self.min_spacing.saturating_sub(now.duration_since(last)))
                    .unwrap_or(Duration::ZERO);

                let window_wait = if sent.len() as u32 >= self.max_requests {
                    sent.front()
                        .map(|&oldest| (oldest + self.window).saturating_duration_since(now))
                        .unwrap_or(Duration::ZERO)
                } else {
                    Duration::ZERO
                };

                let wait = spacing_wait.max(window_wait);
                if wait.is_zero() {
                    sent.push_back(now);
                    return;
                }
                wait
            };

            if wait >= Duration::from_secs(1) {
                info!(delay_ms = wait.as_millis() as u64, "Request budget exhausted, waiting");
            }
            tokio::time::sleep(wait).await;
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW, DEFAULT_MIN_SPACING)
    }
}
