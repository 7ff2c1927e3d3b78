//! Fixed-Window Rate Limiter
//!
//! Per-client request admission over a fixed window. Each client key (an IP
//! address in practice) owns a counter that admits up to N requests per
//! window. Windows reset lazily on the next request after expiry rather
//! than on a timer per key; a single background sweeper evicts idle keys
//! so the map does not grow without bound.
//!
//! The check-and-increment is atomic per key: DashMap's entry API holds the
//! shard lock for the duration, so M concurrent requests against a key with
//! capacity N admit exactly N.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

// ============================================================================
// TYPES
// ============================================================================

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Request admitted.
    Allowed,
    /// Request rejected; retry after the window has room again.
    Limited { retry_after: Duration },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed)
    }
}

/// Per-client window state.
#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    count: u32,
    window_start: Instant,
}

/// Fixed-window rate limiter keyed by client identifier.
pub struct FixedWindowLimiter {
    clients: DashMap<String, WindowCounter>,
    limit: u32,
    window: Duration,
}

impl FixedWindowLimiter {
    /// Create a limiter admitting `limit` requests per `window` per client.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            clients: DashMap::new(),
            limit,
            window,
        }
    }

    /// Check whether a request from `key` is admitted, consuming a slot if so.
    ///
    /// A limit of zero admits nothing.
    pub fn allow(&self, key: &str) -> RateLimitDecision {
        if self.limit == 0 {
            return RateLimitDecision::Limited {
                retry_after: self.window,
            };
        }

        let now = Instant::now();
        let mut entry = self
            .clients
            .entry(key.to_string())
            .or_insert(WindowCounter {
                count: 0,
                window_start: now,
            });

        // Lazy reset: an expired window is recycled by the request that
        // observes it, not by a timer.
        if now.duration_since(entry.window_start) >= self.window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count < self.limit {
            entry.count += 1;
            RateLimitDecision::Allowed
        } else {
            let elapsed = now.duration_since(entry.window_start);
            RateLimitDecision::Limited {
                retry_after: self.window.saturating_sub(elapsed),
            }
        }
    }

    /// Drop entries whose window expired long enough ago that the lazy
    /// reset would zero them anyway.
    pub fn sweep(&self) {
        let now = Instant::now();
        let window = self.window;
        self.clients
            .retain(|_, counter| now.duration_since(counter.window_start) < window * 2);
    }

    /// Number of tracked client keys.
    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    /// Spawn a background task that sweeps idle keys periodically.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::clone(self);
        let period = limiter.window.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                limiter.sweep();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_up_to_limit() {
        let limiter = FixedWindowLimiter::new(3, Duration::from_secs(60));

        assert!(limiter.allow("10.0.0.1").is_allowed());
        assert!(limiter.allow("10.0.0.1").is_allowed());
        assert!(limiter.allow("10.0.0.1").is_allowed());

        match limiter.allow("10.0.0.1") {
            RateLimitDecision::Limited { retry_after } => {
                assert!(retry_after <= Duration::from_secs(60));
            }
            RateLimitDecision::Allowed => panic!("fourth request should be limited"),
        }
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_secs(60));

        assert!(limiter.allow("10.0.0.1").is_allowed());
        assert!(!limiter.allow("10.0.0.1").is_allowed());
        // A different key still has a full window.
        assert!(limiter.allow("10.0.0.2").is_allowed());
    }

    #[test]
    fn test_zero_limit_admits_nothing() {
        let limiter = FixedWindowLimiter::new(0, Duration::from_secs(60));
        assert_eq!(
            limiter.allow("10.0.0.1"),
            RateLimitDecision::Limited {
                retry_after: Duration::from_secs(60)
            }
        );
    }

    #[test]
    fn test_window_resets_lazily() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_millis(20));

        assert!(limiter.allow("10.0.0.1").is_allowed());
        assert!(!limiter.allow("10.0.0.1").is_allowed());

        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.allow("10.0.0.1").is_allowed());
    }

    #[test]
    fn test_sweep_evicts_idle_keys() {
        let limiter = FixedWindowLimiter::new(5, Duration::from_millis(10));

        limiter.allow("10.0.0.1");
        limiter.allow("10.0.0.2");
        assert_eq!(limiter.tracked_clients(), 2);

        std::thread::sleep(Duration::from_millis(25));
        limiter.sweep();
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn test_sweep_keeps_active_keys() {
        let limiter = FixedWindowLimiter::new(5, Duration::from_secs(60));

        limiter.allow("10.0.0.1");
        limiter.sweep();
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_admit_exactly_limit() {
        let limiter = Arc::new(FixedWindowLimiter::new(5, Duration::from_secs(60)));

        let mut handles = Vec::new();
        for _ in 0..32 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.allow("10.0.0.1").is_allowed()
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);
    }
}
