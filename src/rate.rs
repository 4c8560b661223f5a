//! Sliding one-second window rate limiter (`SyncCounter`).
//!
//! Unlike the source this is modelled on, [`RateLimiter::ready`] does not
//! busy-spin while the window is full: callers that need to wait use
//! [`RateLimiter::wait_until_ready`], which sleeps until the earliest
//! timestamp in the window expires.

use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;
use tokio::time::sleep;

const WINDOW: Duration = Duration::from_millis(1000);

/// Enforces an optional maximum number of requests per rolling second.
/// `max_requests <= 0` means unlimited.
pub struct RateLimiter {
    max_requests: i64,
    timestamps: Mutex<VecDeque<u128>>,
}

impl RateLimiter {
    pub fn new(max_requests: i64) -> Self {
        Self {
            max_requests,
            timestamps: Mutex::new(VecDeque::new()),
        }
    }

    /// Drops expired timestamps and reports whether another request may be
    /// dispatched right now.
    pub async fn ready(&self) -> bool {
        if self.max_requests <= 0 {
            return true;
        }

        let mut timestamps = self.timestamps.lock().await;
        evict_expired(&mut timestamps);
        (timestamps.len() as i64) < self.max_requests
    }

    /// Records a dispatch. Must be called immediately before the request it
    /// accounts for starts.
    pub async fn increment(&self) {
        let mut timestamps = self.timestamps.lock().await;
        timestamps.push_back(now_millis());
    }

    /// Sleeps until `ready()` would return true, without busy-spinning.
    pub async fn wait_until_ready(&self) {
        loop {
            if self.ready().await {
                return;
            }

            let wait = {
                let timestamps = self.timestamps.lock().await;
                timestamps.front().map(|&oldest| {
                    let elapsed = now_millis().saturating_sub(oldest);
                    let window_ms = WINDOW.as_millis();
                    if elapsed >= window_ms {
                        Duration::from_millis(0)
                    } else {
                        Duration::from_millis((window_ms - elapsed) as u64)
                    }
                })
            };

            match wait {
                Some(duration) if duration > Duration::ZERO => sleep(duration).await,
                _ => sleep(Duration::from_millis(1)).await,
            }
        }
    }
}

fn evict_expired(timestamps: &mut VecDeque<u128>) {
    let cutoff = now_millis().saturating_sub(WINDOW.as_millis());
    while matches!(timestamps.front(), Some(&ts) if ts < cutoff) {
        timestamps.pop_front();
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unlimited_is_always_ready() {
        let limiter = RateLimiter::new(-1);
        for _ in 0..100 {
            assert!(limiter.ready().await);
            limiter.increment().await;
        }
    }

    #[tokio::test]
    async fn caps_at_max_requests_within_window() {
        let limiter = RateLimiter::new(2);
        assert!(limiter.ready().await);
        limiter.increment().await;
        assert!(limiter.ready().await);
        limiter.increment().await;
        assert!(!limiter.ready().await);
    }

    #[tokio::test]
    async fn window_slides_after_a_second() {
        let limiter = RateLimiter::new(1);
        limiter.increment().await;
        assert!(!limiter.ready().await);
        tokio::time::sleep(Duration::from_millis(1050)).await;
        assert!(limiter.ready().await);
    }
}
