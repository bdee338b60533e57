//! # Request Admission
//!
//! Sliding-window rate limiting keyed by client address.
//!
//! ```text
//!   window = 15 min, max = 10
//!
//!   ──┬──┬──┬─────────────┬──┬──┬──┬──┬──┬──┬──────► t
//!     │  │  │  (expired)  │  │  │  │  │  │  │
//!                         └──────── now - window ──┘
//!   admit(key):
//!     1. drop timestamps older than now - window
//!     2. remaining >= max → deny (nothing recorded)
//!     3. otherwise record now → admit
//! ```
//!
//! Check and record happen under one `std::sync::Mutex` with no `.await`
//! in between, so two concurrent requests can never both take the last slot.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::LimitConfig;

/// Login attempts: 10 per 15 minutes.
pub const LOGIN_LIMIT: LimitConfig = LimitConfig {
    max_events: 10,
    window: Duration::from_secs(15 * 60),
};

/// General API traffic: 120 per minute.
pub const API_LIMIT: LimitConfig = LimitConfig {
    max_events: 120,
    window: Duration::from_secs(60),
};

/// Above this many tracked keys, keys with only stale timestamps are dropped.
pub const GC_THRESHOLD: usize = 1000;

/// A request was denied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Too many requests, retry in {} s", retry_after.as_secs())]
pub struct RateLimited {
    pub retry_after: Duration,
}

#[derive(Debug)]
pub struct SlidingWindowLimiter {
    name: &'static str,
    limit: LimitConfig,
    events: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new(name: &'static str, limit: LimitConfig) -> Self {
        SlidingWindowLimiter {
            name,
            limit,
            events: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> LimitConfig {
        self.limit
    }

    /// Records an event for `key` if it fits in the window.
    pub fn admit(&self, key: &str) -> bool {
        self.admit_at(key, Instant::now())
    }

    /// [`admit`](Self::admit) at an explicit instant.
    pub fn admit_at(&self, key: &str, now: Instant) -> bool {
        let mut events = self.lock();

        let admitted = {
            let stamps = events.entry(key.to_string()).or_default();
            prune(stamps, now, self.limit.window);
            if stamps.len() >= self.limit.max_events {
                false
            } else {
                stamps.push_back(now);
                true
            }
        };

        if events.len() > GC_THRESHOLD {
            let before = events.len();
            let window = self.limit.window;
            events.retain(|_, stamps| {
                prune(stamps, now, window);
                !stamps.is_empty()
            });
            debug!(limiter = self.name, dropped = before - events.len(), "Pruned idle keys");
        }

        if !admitted {
            warn!(limiter = self.name, client = %key, "Rate limit exceeded");
        }
        admitted
    }

    /// How long until `key` gets a free slot; zero when one is free now.
    pub fn retry_after(&self, key: &str) -> Duration {
        self.retry_after_at(key, Instant::now())
    }

    pub fn retry_after_at(&self, key: &str, now: Instant) -> Duration {
        let events = self.lock();
        let Some(stamps) = events.get(key) else {
            return Duration::ZERO;
        };

        let live: Vec<&Instant> = stamps
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < self.limit.window)
            .collect();
        if live.len() < self.limit.max_events {
            return Duration::ZERO;
        }

        // The slot frees when the oldest event that keeps us at the ceiling expires.
        let oldest = live[live.len() - self.limit.max_events];
        (*oldest + self.limit.window).saturating_duration_since(now)
    }

    /// Number of keys currently held in memory.
    pub fn tracked_keys(&self) -> usize {
        self.lock().len()
    }

    /// Admits or returns the denial with its retry hint.
    pub fn check(&self, key: &str) -> Result<(), RateLimited> {
        let now = Instant::now();
        if self.admit_at(key, now) {
            Ok(())
        } else {
            Err(RateLimited {
                retry_after: self.retry_after_at(key, now),
            })
        }
    }

    // A poisoned lock only means another request panicked mid-check; the
    // timestamp map is still usable.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn prune(stamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(front) = stamps.front() {
        if now.saturating_duration_since(*front) >= window {
            stamps.pop_front();
        } else {
            break;
        }
    }
}

/// The two limiters ahead of every handler.
#[derive(Debug)]
pub struct Admission {
    login: SlidingWindowLimiter,
    api: SlidingWindowLimiter,
}

impl Default for Admission {
    fn default() -> Self {
        Admission::new(LOGIN_LIMIT, API_LIMIT)
    }
}

impl Admission {
    pub fn new(login: LimitConfig, api: LimitConfig) -> Self {
        Admission {
            login: SlidingWindowLimiter::new("login", login),
            api: SlidingWindowLimiter::new("api", api),
        }
    }

    /// Login attempts, keyed by client address.
    pub fn admit_login(&self, client: &str) -> Result<(), RateLimited> {
        self.login.check(client)
    }

    /// Any other API request, keyed by client address.
    pub fn admit_api(&self, client: &str) -> Result<(), RateLimited> {
        self.api.check(client)
    }

    pub fn login(&self) -> &SlidingWindowLimiter {
        &self.login
    }

    pub fn api(&self) -> &SlidingWindowLimiter {
        &self.api
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_eleventh_login_denied_then_admitted_after_window() {
        let limiter = SlidingWindowLimiter::new("login", LOGIN_LIMIT);
        let start = Instant::now();

        for i in 0..10 {
            assert!(limiter.admit_at("10.0.0.1", start + Duration::from_secs(i)));
        }
        assert!(!limiter.admit_at("10.0.0.1", start + Duration::from_secs(60)));

        // Denials are not recorded, so the first slot frees 15 min after t=0.
        assert_eq!(
            limiter.retry_after_at("10.0.0.1", start + Duration::from_secs(60)),
            Duration::from_secs(15 * 60 - 60)
        );
        assert!(limiter.admit_at("10.0.0.1", start + Duration::from_secs(15 * 60)));
        assert!(!limiter.admit_at("10.0.0.1", start + Duration::from_secs(15 * 60)));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = SlidingWindowLimiter::new(
            "test",
            LimitConfig {
                max_events: 1,
                window: Duration::from_secs(60),
            },
        );
        let now = Instant::now();
        assert!(limiter.admit_at("a", now));
        assert!(!limiter.admit_at("a", now));
        assert!(limiter.admit_at("b", now));
        assert_eq!(limiter.retry_after_at("c", now), Duration::ZERO);
    }

    #[test]
    fn test_idle_keys_collected_above_threshold() {
        let limiter = SlidingWindowLimiter::new("api", API_LIMIT);
        let start = Instant::now();
        for i in 0..GC_THRESHOLD {
            limiter.admit_at(&format!("10.1.{}.{}", i / 256, i % 256), start);
        }
        assert_eq!(limiter.tracked_keys(), GC_THRESHOLD);

        let later = start + API_LIMIT.window + Duration::from_secs(1);
        assert!(limiter.admit_at("192.168.0.1", later));
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn test_concurrent_admission_never_exceeds_max() {
        let limiter = Arc::new(SlidingWindowLimiter::new(
            "api",
            LimitConfig {
                max_events: 50,
                window: Duration::from_secs(60),
            },
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || (0..20).filter(|_| limiter.admit("shared")).count())
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(admitted, 50);
    }

    #[test]
    fn test_admission_uses_separate_limiters() {
        let admission = Admission::new(
            LimitConfig {
                max_events: 1,
                window: Duration::from_secs(900),
            },
            API_LIMIT,
        );

        admission.admit_login("10.0.0.9").unwrap();
        let denied = admission.admit_login("10.0.0.9").unwrap_err();
        assert!(denied.retry_after > Duration::ZERO);
        assert!(admission.admit_api("10.0.0.9").is_ok());
    }
}
