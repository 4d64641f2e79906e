//! The remote store contract.
//!
//! The remote tier is a memcached-style key-value store reached through one
//! client per bucket. This module only describes how the cache uses it;
//! wire protocols belong to the implementations.

use std::collections::HashMap;

use stratum_core::StoreResult;

/// Remote key-value store used as the second cache tier.
///
/// Implementations must be thread-safe: one store handle is shared by every
/// client routed to its bucket.
///
/// # Not-found vs. falsy
///
/// A missing key is `Ok(None)` (or `Ok(false)` for conditional writes),
/// never an error and never an empty value. A stored value that happens to
/// be falsy is returned as-is, so callers can tell the two apart.
///
/// # Expiration
///
/// `expire` is in seconds; 0 means "never", values above 30 days are
/// absolute unix timestamps. The client has already resolved its default
/// expiration before calling.
pub trait RemoteStore: Send + Sync {
    /// Fetch one value.
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Fetch many values in one round trip. Missing keys are absent from
    /// the returned map.
    fn get_multi(&self, keys: &[&str]) -> StoreResult<HashMap<String, Vec<u8>>>;

    /// Store unconditionally.
    fn set(&self, key: &str, value: &[u8], expire: u32) -> StoreResult<()>;

    /// Store many values in one call. A failure may leave some items
    /// written; nothing is rolled back.
    fn set_multi(&self, items: &[(&str, &[u8])], expire: u32) -> StoreResult<()>;

    /// Store only if absent. `Ok(false)` when the key already exists.
    fn add(&self, key: &str, value: &[u8], expire: u32) -> StoreResult<bool>;

    /// Store only if present. `Ok(false)` when the key does not exist.
    fn replace(&self, key: &str, value: &[u8], expire: u32) -> StoreResult<bool>;

    /// Remove a key. `Ok(false)` when the key did not exist.
    fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Atomically add `delta` to a decimal counter. `Ok(None)` when the key
    /// does not exist.
    fn increment(&self, key: &str, delta: u64) -> StoreResult<Option<u64>>;

    /// Atomically subtract `delta` from a decimal counter, saturating at 0.
    /// `Ok(None)` when the key does not exist.
    fn decrement(&self, key: &str, delta: u64) -> StoreResult<Option<u64>>;

    /// Drop every key in this store.
    fn flush(&self) -> StoreResult<()>;
}
