//! Optional cache for expensive lookups.
//!
//! The updater caches two facts that cost a round trip each: the caller's
//! public IP address as seen by the update host, and the remote filename of
//! a product. Both are advisory. A missing, failing or stale cache only
//! changes how many requests are made, never what the updater decides.
//!
//! # Keys
//!
//! Keys follow `geoipsync.updater.<fact>[@<productId>]`, see [`public_ip_key`]
//! and [`filename_key`].

mod memory;

use std::time::Duration;

use thiserror::Error;

pub use memory::MemoryCacheStore;

/// Lifetime of every cached fact.
pub const CACHE_TTL: Duration = Duration::from_secs(3600);

/// Namespace prefix for updater cache keys.
const KEY_PREFIX: &str = "geoipsync.updater";

/// Errors reported by a cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend could not be reached.
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Key/value store with per-entry time-to-live.
///
/// Reads and writes are independent; there is no compare-and-swap. Two
/// updaters racing on the same key both fetch and both write, which is
/// harmless for the values stored here.
pub trait CacheStore: Send + Sync {
    /// Look up a value. Expired entries are reported as `None`.
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value that expires after `ttl`.
    fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
}

/// Key for the caller's public IP address.
pub fn public_ip_key() -> String {
    format!("{}.myip", KEY_PREFIX)
}

/// Key for the remote filename of `product_id`.
pub fn filename_key(product_id: &str) -> String {
    format!("{}.filename@{}", KEY_PREFIX, product_id)
}
