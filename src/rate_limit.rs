use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::metrics::RATE_LIMIT_TRACKED_KEYS;

pub const DEFAULT_MAX_TRACKED_KEYS: usize = 500;

// Rate limit entry - tracks requests per user/IP/key inside one fixed window
#[derive(Debug, Clone, Copy)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_at: Instant,
}

impl RateLimitEntry {
    fn fresh(now: Instant, window: Duration) -> Self {
        Self {
            count: 1,
            reset_at: now + window,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.reset_at
    }
}

/// What happens to the stored count when a request is rejected.
///
/// `CountRejected` is the long-standing behaviour: every call increments, so a
/// key that keeps hammering past its limit keeps a growing count until the
/// window ends. `SkipRejected` leaves the count at the limit instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RejectionPolicy {
    #[default]
    CountRejected,
    SkipRejected,
}

/// Fixed-window request counter keyed by an opaque identifier.
///
/// Every instance owns its own table, so the api, generation and auth limiters
/// never see each other's keys. The limit is passed per call because one
/// limiter guards several routes with different budgets.
pub struct RateLimiter {
    name: &'static str,
    entries: DashMap<String, RateLimitEntry>,
    window: Duration,
    max_tracked_keys: usize,
    policy: RejectionPolicy,
}

impl RateLimiter {
    pub fn new(name: &'static str, window: Duration) -> Self {
        Self {
            name,
            entries: DashMap::new(),
            window,
            max_tracked_keys: DEFAULT_MAX_TRACKED_KEYS,
            policy: RejectionPolicy::default(),
        }
    }

    pub fn with_max_tracked_keys(mut self, max_tracked_keys: usize) -> Self {
        self.max_tracked_keys = max_tracked_keys;
        self
    }

    pub fn with_policy(mut self, policy: RejectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the request is admitted. `limit` is the number of
    /// requests allowed per window and is expected to be at least 1.
    pub fn check(&self, limit: u32, key: &str) -> bool {
        self.check_at(limit, key, Instant::now())
    }

    pub fn check_at(&self, limit: u32, key: &str, now: Instant) -> bool {
        // sweep before touching the entry, retain() needs every shard lock
        if self.entries.len() > self.max_tracked_keys {
            self.sweep_expired(now);
        }

        let mut entry = match self.entries.entry(key.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(RateLimitEntry::fresh(now, self.window));
                RATE_LIMIT_TRACKED_KEYS
                    .with_label_values(&[self.name])
                    .set(self.entries.len() as f64);
                return true;
            }
            Entry::Occupied(occupied) => occupied.into_ref(),
        };

        if entry.is_expired(now) {
            *entry = RateLimitEntry::fresh(now, self.window);
            return true;
        }

        let next = entry.count.saturating_add(1);
        if next > limit {
            if self.policy == RejectionPolicy::CountRejected {
                entry.count = next;
            }
            debug!(limiter = self.name, key, count = next, limit, "rate limit exceeded");
            return false;
        }

        entry.count = next;
        true
    }

    pub fn reset(&self, key: &str) {
        self.entries.remove(key);
        RATE_LIMIT_TRACKED_KEYS
            .with_label_values(&[self.name])
            .set(self.entries.len() as f64);
    }

    /// Count observed for `key` in its active window, 0 when absent or expired.
    pub fn get_remaining(&self, key: &str) -> u32 {
        self.get_remaining_at(key, Instant::now())
    }

    pub fn get_remaining_at(&self, key: &str, now: Instant) -> u32 {
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => entry.count,
            _ => 0,
        }
    }

    fn sweep_expired(&self, now: Instant) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let after = self.entries.len();
        RATE_LIMIT_TRACKED_KEYS
            .with_label_values(&[self.name])
            .set(after as f64);
        debug!(limiter = self.name, before, after, "swept expired rate limit entries");
    }
}

// The three limiter instances, each with independent storage
pub struct Limiters {
    pub api: RateLimiter,
    pub generation: RateLimiter,
    // not wired to any route; kept so an auth front-end can share the process
    pub auth: RateLimiter,
}

impl Limiters {
    pub fn new(
        api_window: Duration,
        generation_window: Duration,
        auth_window: Duration,
        max_tracked_keys: usize,
        policy: RejectionPolicy,
    ) -> Self {
        let build = |name, window| {
            RateLimiter::new(name, window)
                .with_max_tracked_keys(max_tracked_keys)
                .with_policy(policy)
        };
        Self {
            api: build("api", api_window),
            generation: build("generation", generation_window),
            auth: build("auth", auth_window),
        }
    }
}

impl Default for Limiters {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
            Duration::from_secs(15 * 60),
            DEFAULT_MAX_TRACKED_KEYS,
            RejectionPolicy::default(),
        )
    }
}
