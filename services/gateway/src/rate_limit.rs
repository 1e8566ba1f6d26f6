use crate::error::AppError;
use dashmap::DashMap;
use std::time::Instant;
use tracing::warn;

#[derive(Clone)]
struct Bucket {
    capacity: u32,
    tokens: f64,
    refill_rate: f64,
    last_update: Instant,
}

impl Bucket {
    fn new(capacity: u32, refill_rate: f64, now: Instant) -> Self {
        Self {
            capacity,
            tokens: capacity as f64,
            refill_rate,
            last_update: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.tokens = f64::min(
            self.capacity as f64,
            self.tokens + elapsed * self.refill_rate,
        );
        self.last_update = now;
    }

    fn allow_request(&mut self, tokens: u32, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= tokens as f64 {
            self.tokens -= tokens as f64;
            true
        } else {
            false
        }
    }

    fn is_full(&self) -> bool {
        self.tokens >= self.capacity as f64
    }
}

/// Burst size and sustained rate for one kind of action
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    pub capacity: u32,
    /// Tokens regained per second
    pub refill_rate: f64,
}

impl RateLimit {
    pub const fn new(capacity: u32, refill_rate: f64) -> Self {
        Self {
            capacity,
            refill_rate,
        }
    }
}

/// Limits applied by the gateway
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimits {
    /// Per email address
    pub login: RateLimit,
    /// Per email address
    pub register: RateLimit,
    /// Per user, HTTP and websocket sends combined
    pub message: RateLimit,
    pub ws_connect: RateLimit,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            login: RateLimit::new(5, 5.0 / 60.0),
            register: RateLimit::new(3, 3.0 / 3600.0),
            message: RateLimit::new(20, 2.0),
            ws_connect: RateLimit::new(10, 1.0),
        }
    }
}

/// Token buckets keyed by action and caller
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    pub fn check(&self, key: &str, limit: RateLimit) -> Result<(), AppError> {
        self.check_at(key, limit, Instant::now())
    }

    fn check_at(&self, key: &str, limit: RateLimit, now: Instant) -> Result<(), AppError> {
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket::new(limit.capacity, limit.refill_rate, now));

        if bucket.allow_request(1, now) {
            Ok(())
        } else {
            warn!(key, "rate limit exceeded");
            Err(AppError::RateLimitExceeded(
                "Too many requests, slow down".to_string(),
            ))
        }
    }

    /// Drop buckets that have refilled completely; a fresh bucket behaves
    /// the same. Returns how many were removed.
    pub fn prune(&self) -> usize {
        self.prune_at(Instant::now())
    }

    fn prune_at(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| {
            bucket.refill(now);
            !bucket.is_full()
        });
        before.saturating_sub(self.buckets.len())
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
