//! Sliding-window rate limiter.
//!
//! Per-process, in-memory admission control: a best-effort guard against
//! accidental abuse and runaway retry loops, not a security boundary. State
//! is never shared across instances.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;

use crate::config::RateLimitConfig;

/// Sliding window log limiter: retains, per identifier, the timestamps of
/// admitted requests within the trailing window.
pub struct SlidingWindowLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, Vec<DateTime<Utc>>>>,
}

impl SlidingWindowLimiter {
    pub fn new(config: RateLimitConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            windows: Mutex::new(HashMap::new()),
        })
    }

    fn window_delta(&self) -> TimeDelta {
        TimeDelta::from_std(self.config.window).unwrap_or(TimeDelta::seconds(60))
    }

    /// Admit or reject a request for `identifier`.
    ///
    /// Prune-then-append runs under one lock acquisition, so the
    /// read-modify-write is atomic per identifier. Rejected attempts record
    /// no timestamp.
    pub async fn is_allowed(&self, identifier: &str) -> bool {
        let now = Utc::now();
        let cutoff = now - self.window_delta();

        let mut windows = self.windows.lock().await;
        let timestamps = windows.entry(identifier.to_string()).or_default();
        timestamps.retain(|t| *t > cutoff);

        if timestamps.len() >= self.config.max_requests as usize {
            tracing::debug!(identifier, retained = timestamps.len(), "Rate limit hit");
            return false;
        }

        timestamps.push(now);
        true
    }

    /// Requests still admissible for `identifier` in the current window.
    pub async fn remaining(&self, identifier: &str) -> u32 {
        let cutoff = Utc::now() - self.window_delta();
        let windows = self.windows.lock().await;
        let retained = windows
            .get(identifier)
            .map(|timestamps| timestamps.iter().filter(|t| **t > cutoff).count())
            .unwrap_or(0);
        (self.config.max_requests as usize).saturating_sub(retained) as u32
    }

    /// When capacity next frees up for `identifier`: the instant the oldest
    /// retained entry falls outside the window, or now if nothing is retained.
    pub async fn reset_at(&self, identifier: &str) -> DateTime<Utc> {
        let now = Utc::now();
        let cutoff = now - self.window_delta();
        let windows = self.windows.lock().await;
        windows
            .get(identifier)
            .and_then(|timestamps| timestamps.iter().filter(|t| **t > cutoff).min())
            .map(|oldest| *oldest + self.window_delta())
            .unwrap_or(now)
    }

    /// Drop identifiers with no retained timestamps. Keeps the map bounded
    /// for long-running processes with many one-off callers.
    pub async fn prune_idle(&self) -> usize {
        let cutoff = Utc::now() - self.window_delta();
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, timestamps| {
            timestamps.retain(|t| *t > cutoff);
            !timestamps.is_empty()
        });
        before - windows.len()
    }

    /// Number of tracked identifiers (for diagnostics).
    pub async fn tracked_identifiers(&self) -> usize {
        self.windows.lock().await.len()
    }
}

/// Spawn a background task that periodically prunes idle identifiers.
pub fn spawn_prune_task(
    limiter: Arc<SlidingWindowLimiter>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let dropped = limiter.prune_idle().await;
            if dropped > 0 {
                tracing::debug!(dropped, "Pruned idle rate-limit identifiers");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window: Duration) -> Arc<SlidingWindowLimiter> {
        SlidingWindowLimiter::new(RateLimitConfig {
            max_requests,
            window,
        })
    }

    #[tokio::test]
    async fn admits_up_to_max_then_rejects() {
        let limiter = limiter(3, Duration::from_secs(60));
        assert!(limiter.is_allowed("user-1").await);
        assert!(limiter.is_allowed("user-1").await);
        assert!(limiter.is_allowed("user-1").await);
        assert!(!limiter.is_allowed("user-1").await);
    }

    #[tokio::test]
    async fn identifiers_are_independent() {
        let limiter = limiter(1, Duration::from_secs(60));
        assert!(limiter.is_allowed("user-1").await);
        assert!(!limiter.is_allowed("user-1").await);
        assert!(limiter.is_allowed("user-2").await);
    }

    #[tokio::test]
    async fn rejected_attempts_record_nothing() {
        let limiter = limiter(2, Duration::from_secs(60));
        assert!(limiter.is_allowed("u").await);
        assert!(limiter.is_allowed("u").await);
        // Three rejected attempts must not extend the window occupancy.
        for _ in 0..3 {
            assert!(!limiter.is_allowed("u").await);
        }
        assert_eq!(limiter.remaining("u").await, 0);
        let windows = limiter.windows.lock().await;
        assert_eq!(windows.get("u").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn window_expiry_readmits() {
        let limiter = limiter(1, Duration::from_millis(50));
        assert!(limiter.is_allowed("u").await);
        assert!(!limiter.is_allowed("u").await);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(limiter.is_allowed("u").await);
    }

    #[tokio::test]
    async fn remaining_counts_down() {
        let limiter = limiter(3, Duration::from_secs(60));
        assert_eq!(limiter.remaining("u").await, 3);
        limiter.is_allowed("u").await;
        assert_eq!(limiter.remaining("u").await, 2);
    }

    #[tokio::test]
    async fn reset_at_is_now_when_empty() {
        let limiter = limiter(3, Duration::from_secs(60));
        let before = Utc::now();
        let reset = limiter.reset_at("nobody").await;
        assert!(reset >= before);
        assert!(reset <= Utc::now());
    }

    #[tokio::test]
    async fn reset_at_tracks_oldest_entry() {
        let limiter = limiter(1, Duration::from_secs(60));
        limiter.is_allowed("u").await;
        let reset = limiter.reset_at("u").await;
        // Oldest entry + window ≈ one minute out.
        let delta = reset - Utc::now();
        assert!(delta > TimeDelta::seconds(58));
        assert!(delta <= TimeDelta::seconds(60));
    }

    #[tokio::test]
    async fn prune_idle_drops_expired_identifiers() {
        let limiter = limiter(5, Duration::from_millis(30));
        limiter.is_allowed("a").await;
        limiter.is_allowed("b").await;
        assert_eq!(limiter.tracked_identifiers().await, 2);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(limiter.prune_idle().await, 2);
        assert_eq!(limiter.tracked_identifiers().await, 0);
    }
}
