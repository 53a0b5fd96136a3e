//! Rate limiting implementation
//!
//! Uses the governor crate for token bucket rate limiting. Marketo grants a
//! fixed request budget per window (100 calls per 20 seconds by default), so
//! the quota replenishes one permit per `window / requests` with the full
//! budget available as burst.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for rate limiting
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Requests allowed per window
    pub requests: u32,
    /// Window length
    pub window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests: 100,
            window: Duration::from_secs(20),
        }
    }
}

impl RateLimiterConfig {
    /// Create a config allowing `requests` per `window`
    pub fn per_window(requests: u32, window: Duration) -> Self {
        Self { requests, window }
    }
}

/// Token bucket rate limiter
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given config
    pub fn new(config: &RateLimiterConfig) -> Self {
        let requests = NonZeroU32::new(config.requests).unwrap_or(NonZeroU32::MIN);
        let replenish = config
            .window
            .checked_div(requests.get())
            .unwrap_or_default();
        let quota = Quota::with_period(replenish)
            .unwrap_or_else(|| Quota::per_second(requests))
            .allow_burst(requests);

        Self {
            limiter: Arc::new(Governor::direct(quota)),
        }
    }

    /// Create a rate limiter with Marketo's documented default budget
    pub fn default_limiter() -> Self {
        Self::new(&RateLimiterConfig::default())
    }

    /// Wait until a request can be made
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    /// Try to acquire a permit, returning immediately
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// Wait with a timeout
    pub async fn wait_with_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.limiter.until_ready())
            .await
            .is_ok()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::default_limiter()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish()
    }
}

#[cfg(test)]
mod rate_limit_tests {
    use super::*;

    #[test]
    fn test_rate_limiter_config_default() {
        let config = RateLimiterConfig::default();
        assert_eq!(config.requests, 100);
        assert_eq!(config.window, Duration::from_secs(20));
    }

    #[test]
    fn test_rate_limiter_config_per_window() {
        let config = RateLimiterConfig::per_window(50, Duration::from_secs(10));
        assert_eq!(config.requests, 50);
        assert_eq!(config.window, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_rate_limiter_allows_full_budget_as_burst() {
        let limiter = RateLimiter::new(&RateLimiterConfig::per_window(5, Duration::from_secs(60)));

        for _ in 0..5 {
            assert!(limiter.try_acquire());
        }
        assert!(!limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_rate_limiter_wait() {
        let limiter =
            RateLimiter::new(&RateLimiterConfig::per_window(100, Duration::from_secs(20)));

        // Within the burst budget, so this returns without blocking
        limiter.wait().await;
    }

    #[tokio::test]
    async fn test_rate_limiter_wait_with_timeout() {
        let limiter =
            RateLimiter::new(&RateLimiterConfig::per_window(100, Duration::from_secs(20)));

        let result = limiter.wait_with_timeout(Duration::from_millis(100)).await;
        assert!(result);
    }

    #[test]
    fn test_zero_requests_clamps_to_one() {
        let limiter = RateLimiter::new(&RateLimiterConfig::per_window(0, Duration::from_secs(1)));
        assert!(limiter.try_acquire());
    }
}
