use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::flag_env;

/// Checks between two sweeps of idle keys.
const SWEEP_EVERY: usize = 256;

#[derive(Default)]
struct Window {
    span: Duration,
    hits: VecDeque<Instant>,
}

/// Sliding window in-memory rate limiter (per process).
#[derive(Clone)]
pub struct InMemoryRateLimiter {
    store: Arc<DashMap<String, Window>>,
    checks: Arc<AtomicUsize>,
    pub enabled: bool,
}

impl InMemoryRateLimiter {
    pub fn new(enabled: bool) -> Self {
        Self { store: Arc::new(DashMap::new()), checks: Arc::new(AtomicUsize::new(0)), enabled }
    }

    /// Returns true if allowed, false if limited.
    pub fn check(&self, key: &str, limit: usize, window: Duration) -> bool {
        if !self.enabled {
            return true;
        }
        let now = Instant::now();
        let allowed = {
            let mut entry = self.store.entry(key.to_string()).or_default();
            entry.span = window;
            while entry.hits.front().is_some_and(|t| now.duration_since(*t) >= window) {
                entry.hits.pop_front();
            }
            if entry.hits.len() < limit {
                entry.hits.push_back(now);
                true
            } else {
                false
            }
        };
        // the entry guard must be released before sweeping the map
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep();
        }
        allowed
    }

    /// Drops keys whose every hit has left its window.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.store
            .retain(|_, w| w.hits.back().is_some_and(|t| now.duration_since(*t) < w.span));
    }

    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }
}

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub comment_limit: usize,
    pub comment_window: Duration,
    pub upload_limit: usize,
    pub upload_window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            comment_limit: 5,
            comment_window: Duration::from_secs(60),
            upload_limit: 30,
            upload_window: Duration::from_secs(3600),
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        fn usize_env(name: &str, default: usize) -> usize {
            std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
        }
        fn secs_env(name: &str, default: Duration) -> Duration {
            std::env::var(name).ok().and_then(|v| v.parse().ok()).map(Duration::from_secs).unwrap_or(default)
        }
        let d = Self::default();
        Self {
            comment_limit: usize_env("RL_COMMENT_LIMIT", d.comment_limit),
            comment_window: secs_env("RL_COMMENT_WINDOW", d.comment_window),
            upload_limit: usize_env("RL_UPLOAD_LIMIT", d.upload_limit),
            upload_window: secs_env("RL_UPLOAD_WINDOW", d.upload_window),
        }
    }
}

/// Per-action throttles keyed by account id.
#[derive(Clone)]
pub struct RateLimiterFacade {
    pub limiter: InMemoryRateLimiter,
    pub cfg: RateLimitConfig,
}

impl RateLimiterFacade {
    pub fn new(limiter: InMemoryRateLimiter, cfg: RateLimitConfig) -> Self {
        Self { limiter, cfg }
    }

    /// `RL_ENABLED` (default on) plus the `RL_*` limits.
    pub fn from_env() -> Self {
        let enabled = std::env::var("RL_ENABLED").is_err() || flag_env("RL_ENABLED");
        Self::new(InMemoryRateLimiter::new(enabled), RateLimitConfig::from_env())
    }

    pub fn disabled() -> Self {
        Self::new(InMemoryRateLimiter::new(false), RateLimitConfig::default())
    }

    pub fn allow_comment(&self, account: &str) -> bool {
        self.limiter.check(&format!("comment:{account}"), self.cfg.comment_limit, self.cfg.comment_window)
    }

    pub fn allow_upload(&self, account: &str) -> bool {
        self.limiter.check(&format!("upload:{account}"), self.cfg.upload_limit, self.cfg.upload_window)
    }
}
