//! Per-user sliding-window rate limiter.
//!
//! Keyed by user_id and backed by an in-memory map, which is sufficient
//! for single-process deployments; the boundary layer constructs one
//! limiter and shares it across handlers.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

pub struct RateLimiter {
    limit: usize,
    window: Duration,
    hits: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            limit: config.limit,
            window: Duration::from_secs(config.window_secs),
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Record a request for `user_id`. Returns `false` when the user has
    /// exhausted their window.
    pub fn check(&self, user_id: &str) -> bool {
        let now = Instant::now();
        let mut hits = match self.hits.lock() {
            Ok(guard) => guard,
            // A poisoned lock only means another thread panicked mid-check;
            // the timestamp map is still usable.
            Err(poisoned) => poisoned.into_inner(),
        };

        let timestamps = hits.entry(user_id.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.limit {
            return false;
        }

        timestamps.push(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: usize, window_secs: u64) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig { limit, window_secs })
    }

    #[test]
    fn test_allows_up_to_limit() {
        let rl = limiter(3, 60);
        assert!(rl.check("alice"));
        assert!(rl.check("alice"));
        assert!(rl.check("alice"));
        assert!(!rl.check("alice"));
    }

    #[test]
    fn test_users_are_independent() {
        let rl = limiter(1, 60);
        assert!(rl.check("alice"));
        assert!(!rl.check("alice"));
        assert!(rl.check("bob"));
    }

    #[test]
    fn test_window_expiry_readmits() {
        let rl = limiter(1, 0); // zero-length window: every hit expires immediately
        assert!(rl.check("alice"));
        assert!(rl.check("alice"));
    }
}
