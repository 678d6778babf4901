//! Cache / velocity store (spec §4.2) and the per-tenant rate limiter built
//! on top of it (spec §5 "rate-limit 20ms").
//!
//! Grounded on the teacher's `middleware::rate_limit::RateLimitLayer`: a
//! `parking_lot::Mutex<HashMap<..>>` guarding per-key counters with a
//! window start, generalized from "per IP, fixed window" to the spec's
//! richer contract (`get`/`set`/`incr`/`zadd`/`zrange`/`del`, arbitrary TTL).
//! The sorted-set operations back the sliding-window velocity counters that
//! the context assembler reads (§4.3, §9 "Velocity counters").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Clone)]
struct Entry {
    value: serde_json::Value,
    expires_at: Option<Instant>,
}

struct ZEntry {
    events: Vec<Instant>,
    expires_at: Option<Instant>,
}

/// In-process substrate for idempotency caching, atomic counters, and
/// sliding-window event sets. A Redis-backed implementation of the same
/// shape would be a drop-in for a real multi-process deployment; kept
/// in-process here since the core only needs the contract, not a specific
/// backend (spec §4.2 describes operations, not a wire protocol).
#[derive(Clone)]
pub struct Cache {
    kv: Arc<Mutex<HashMap<String, Entry>>>,
    counters: Arc<Mutex<HashMap<String, (u64, Option<Instant>)>>>,
    zsets: Arc<Mutex<HashMap<String, ZEntry>>>,
    /// When true, every read/write behaves as a miss/no-op and callers are
    /// expected to treat the surrounding feature as "unknown" — the
    /// fail-open degradation path (spec §4.2, §7).
    reachable: Arc<Mutex<bool>>,
}

impl Cache {
    pub fn new() -> Self {
        Self {
            kv: Arc::new(Mutex::new(HashMap::new())),
            counters: Arc::new(Mutex::new(HashMap::new())),
            zsets: Arc::new(Mutex::new(HashMap::new())),
            reachable: Arc::new(Mutex::new(true)),
        }
    }

    pub fn is_reachable(&self) -> bool {
        *self.reachable.lock()
    }

    /// Test/ops hook simulating a cache outage (scenario S4).
    pub fn set_reachable(&self, reachable: bool) {
        *self.reachable.lock() = reachable;
    }

    fn expired(expires_at: Option<Instant>) -> bool {
        expires_at.map(|t| Instant::now() >= t).unwrap_or(false)
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        if !self.is_reachable() {
            return None;
        }
        let mut kv = self.kv.lock();
        match kv.get(key) {
            Some(entry) if Self::expired(entry.expires_at) => {
                kv.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    pub fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) {
        if !self.is_reachable() {
            return;
        }
        self.kv.lock().insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Some(Instant::now() + ttl),
            },
        );
    }

    pub fn del(&self, key: &str) {
        self.kv.lock().remove(key);
        self.counters.lock().remove(key);
        self.zsets.lock().remove(key);
    }

    /// `INCR` with first-increment-sets-TTL semantics.
    pub fn incr(&self, key: &str, ttl: Duration) -> u64 {
        if !self.is_reachable() {
            return 0;
        }
        let mut counters = self.counters.lock();
        let now = Instant::now();
        let entry = counters.entry(key.to_string()).or_insert((0, None));
        if entry.1.map(|exp| now >= exp).unwrap_or(false) {
            *entry = (0, None);
        }
        entry.0 += 1;
        if entry.1.is_none() {
            entry.1 = Some(now + ttl);
        }
        entry.0
    }

    /// Add an event timestamp to the sliding-window set for `key`, trimming
    /// anything older than `window` before returning the live count.
    pub fn zadd_now(&self, key: &str, window: Duration) -> u64 {
        if !self.is_reachable() {
            return 0;
        }
        let mut zsets = self.zsets.lock();
        let now = Instant::now();
        let entry = zsets.entry(key.to_string()).or_insert(ZEntry {
            events: Vec::new(),
            expires_at: None,
        });
        entry.events.push(now);
        entry.events.retain(|t| now.duration_since(*t) <= window);
        entry.expires_at = Some(now + window);
        entry.events.len() as u64
    }

    /// Read-only count of events still inside `window`; never mutates.
    /// Returns 0 on miss or unreachable cache (spec §4.2).
    pub fn zrange_count(&self, key: &str, window: Duration) -> u64 {
        if !self.is_reachable() {
            return 0;
        }
        let zsets = self.zsets.lock();
        let now = Instant::now();
        match zsets.get(key) {
            Some(entry) => entry
                .events
                .iter()
                .filter(|t| now.duration_since(**t) <= window)
                .count() as u64,
            None => 0,
        }
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

/// Sliding-window request budget enforcement, layered on `Cache::zadd_now`
/// (spec §4.2: "a sliding window of one minute" — not a reset-on-boundary
/// fixed window). Fail-open: an unreachable cache admits the request and
/// marks it degraded rather than rejecting it.
pub struct RateLimiter {
    cache: Cache,
}

pub enum RateLimitOutcome {
    Allowed,
    Exceeded { retry_after_secs: u64 },
    Degraded,
}

impl RateLimiter {
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }

    pub fn check(&self, tenant_id: &str, limit_per_minute: u32) -> RateLimitOutcome {
        if !self.cache.is_reachable() {
            return RateLimitOutcome::Degraded;
        }
        let key = format!("ratelimit:{tenant_id}");
        let window = Duration::from_secs(60);
        let count = self.cache.zadd_now(&key, window);
        if count > limit_per_minute as u64 {
            RateLimitOutcome::Exceeded {
                retry_after_secs: 60,
            }
        } else {
            RateLimitOutcome::Allowed
        }
    }
}
