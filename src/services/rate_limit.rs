// In-process token-bucket rate limiting
// Buckets are keyed by endpoint class + source identity and live in memory;
// their loss on restart only re-grants capacity. Distributed limiting is a
// deliberate non-goal: a scaled-out deployment enforces per-instance limits.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::app_config::RateLimitSettings;

/// Token-bucket parameters for one endpoint class
#[derive(Debug, Clone, PartialEq)]
pub struct BucketConfig {
    /// Maximum tokens the bucket holds; new buckets start full
    pub capacity: u32,
    /// Tokens granted back per refill period
    pub refill_amount: u32,
    /// Length of the refill period
    pub refill_period: Duration,
}

impl BucketConfig {
    /// Login endpoint class: 5 attempts per 15 minutes per source
    pub fn login(settings: &RateLimitSettings) -> Self {
        Self {
            capacity: settings.login_capacity,
            refill_amount: settings.login_capacity,
            refill_period: Duration::from_secs(settings.login_window_seconds),
        }
    }

    /// Registration endpoint class: 3 attempts per hour per source
    pub fn register(settings: &RateLimitSettings) -> Self {
        Self {
            capacity: settings.register_capacity,
            refill_amount: settings.register_capacity,
            refill_period: Duration::from_secs(settings.register_window_seconds),
        }
    }

    /// General API class: 100 requests per minute per source
    pub fn api(settings: &RateLimitSettings) -> Self {
        Self {
            capacity: settings.api_capacity,
            refill_amount: settings.api_capacity,
            refill_period: Duration::from_secs(settings.api_window_seconds),
        }
    }
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn full(config: &BucketConfig) -> Self {
        Self {
            tokens: config.capacity as f64,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, config: &BucketConfig, now: Instant) {
        let elapsed = now.duration_since(self.last_refill);
        if elapsed.is_zero() || config.refill_period.is_zero() {
            return;
        }
        let earned =
            elapsed.as_secs_f64() / config.refill_period.as_secs_f64() * config.refill_amount as f64;
        self.tokens = (self.tokens + earned).min(config.capacity as f64);
        self.last_refill = now;
    }
}

/// Per-key token-bucket limiter; safe for concurrent use
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Atomically try to take `n` tokens from the bucket for `key`. The
    /// first call for a key resolves a full bucket; subsequent calls reuse
    /// it. Returns false when the tokens are not available.
    pub fn try_consume(&self, key: &str, config: &BucketConfig, n: u32) -> bool {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().expect("bucket map lock poisoned");

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket::full(config));
        bucket.refill(config, now);

        if bucket.tokens >= n as f64 {
            bucket.tokens -= n as f64;
            true
        } else {
            false
        }
    }

    /// Whole tokens currently available for `key` (full capacity for an
    /// unseen key)
    pub fn available(&self, key: &str, config: &BucketConfig) -> u32 {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().expect("bucket map lock poisoned");

        match buckets.get_mut(key) {
            Some(bucket) => {
                bucket.refill(config, now);
                bucket.tokens as u32
            },
            None => config.capacity,
        }
    }

    /// Number of live buckets (monitoring)
    pub fn bucket_count(&self) -> usize {
        self.buckets.lock().expect("bucket map lock poisoned").len()
    }
}

/// Key for the login endpoint class, namespaced so registration traffic
/// cannot consume login capacity
pub fn login_key(ip: &str) -> String {
    format!("login:ip:{}", ip)
}

/// Key for the registration endpoint class
pub fn register_key(ip: &str) -> String {
    format!("register:ip:{}", ip)
}

/// Key for the general API class
pub fn api_key(ip: &str) -> String {
    format!("api:ip:{}", ip)
}
