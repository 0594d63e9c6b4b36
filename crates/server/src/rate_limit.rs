//! Login rate limiting per peer IP

use dashmap::DashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use stockwatch_core::RateLimitConfig;

/// Fixed-window counter of `register` attempts keyed by peer IP
#[derive(Debug)]
pub struct LoginLimiter {
    config: RateLimitConfig,
    windows: DashMap<IpAddr, AttemptWindow>,
}

#[derive(Debug, Clone, Copy)]
struct AttemptWindow {
    started: Instant,
    attempts: u32,
}

/// Result of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    Allowed {
        /// Attempts left in the current window
        remaining: u32,
    },
    Denied {
        retry_after: Duration,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }
}

impl LoginLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    /// Count one attempt from `ip`
    pub fn check(&self, ip: IpAddr) -> RateLimitResult {
        self.check_at(ip, Instant::now())
    }

    pub fn check_at(&self, ip: IpAddr, now: Instant) -> RateLimitResult {
        if !self.config.enabled {
            return RateLimitResult::Allowed { remaining: u32::MAX };
        }

        let window = self.config.window();
        let mut entry = self.windows.entry(ip).or_insert(AttemptWindow {
            started: now,
            attempts: 0,
        });

        if now.saturating_duration_since(entry.started) >= window {
            *entry = AttemptWindow {
                started: now,
                attempts: 0,
            };
        }

        if entry.attempts >= self.config.max_attempts {
            let retry_after = window.saturating_sub(now.saturating_duration_since(entry.started));
            return RateLimitResult::Denied { retry_after };
        }

        entry.attempts += 1;
        RateLimitResult::Allowed {
            remaining: self.config.max_attempts - entry.attempts,
        }
    }

    /// Drop windows that have fully expired
    pub fn cleanup(&self) {
        let now = Instant::now();
        let window = self.config.window();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < window);
    }

    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}
