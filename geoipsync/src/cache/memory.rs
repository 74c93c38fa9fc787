//! In-process cache store using moka.
//!
//! Wraps `moka::sync::Cache` with a per-entry expiry policy so each value
//! lives exactly as long as the TTL it was stored with.

use std::time::{Duration, Instant};

use moka::sync::Cache as MokaCache;
use moka::Expiry;

use super::{CacheError, CacheStore};

/// Upper bound on stored entries. The updater only ever writes a handful.
const DEFAULT_MAX_ENTRIES: u64 = 1024;

#[derive(Debug, Clone)]
struct CachedFact {
    value: String,
    ttl: Duration,
}

/// Expires each entry after the TTL it was inserted with.
struct FactExpiry;

impl Expiry<String, CachedFact> for FactExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedFact,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedFact,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Memory-backed [`CacheStore`].
pub struct MemoryCacheStore {
    cache: MokaCache<String, CachedFact>,
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    /// Create a store holding at most `max_entries` values.
    pub fn with_capacity(max_entries: u64) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(max_entries)
            .expire_after(FactExpiry)
            .build();

        Self { cache }
    }

    /// Number of live entries (approximate, as reported by moka).
    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.cache.get(key).map(|fact| fact.value))
    }

    fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.cache.insert(key.to_string(), CachedFact { value, ttl });
        Ok(())
    }
}
