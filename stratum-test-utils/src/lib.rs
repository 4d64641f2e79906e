//! stratum Test Utilities
//!
//! Shared test infrastructure for the stratum workspace:
//! - Proptest generators for ids, groups and cacheable values
//! - Remote store doubles (outages, call counting)
//! - Client fixtures over in-memory buckets
//! - Assertions for cache-specific results

// Re-export the in-memory store from its source crate
pub use stratum_storage::{
    BucketRouter, CacheClient, CacheRead, MemoryStore, ReadPolicy, ReadSource, RemoteStore,
};

// Re-export core types for convenience
pub use stratum_core::{
    CacheConfig, CacheError, CacheKey, CacheResult, CacheStats, GroupSet, KeyNamespace, OpKind,
    StoreError, StoreResult, TenantMode,
};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// LOGGING
// ============================================================================

/// Route `tracing` output to the test harness. Safe to call from every test.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// REMOTE STORE DOUBLES
// ============================================================================

/// A store that can be taken offline. While down, every call fails with
/// [`StoreError::Unreachable`].
#[derive(Clone)]
pub struct FlakyStore {
    inner: MemoryStore,
    down: Arc<AtomicBool>,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            down: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn check(&self) -> StoreResult<()> {
        if self.down.load(Ordering::SeqCst) {
            Err(StoreError::Unreachable {
                server: "flaky".to_string(),
                reason: "connection refused".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl RemoteStore for FlakyStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.check()?;
        self.inner.get(key)
    }

    fn get_multi(&self, keys: &[&str]) -> StoreResult<HashMap<String, Vec<u8>>> {
        self.check()?;
        self.inner.get_multi(keys)
    }

    fn set(&self, key: &str, value: &[u8], expire: u32) -> StoreResult<()> {
        self.check()?;
        self.inner.set(key, value, expire)
    }

    fn set_multi(&self, items: &[(&str, &[u8])], expire: u32) -> StoreResult<()> {
        self.check()?;
        self.inner.set_multi(items, expire)
    }

    fn add(&self, key: &str, value: &[u8], expire: u32) -> StoreResult<bool> {
        self.check()?;
        self.inner.add(key, value, expire)
    }

    fn replace(&self, key: &str, value: &[u8], expire: u32) -> StoreResult<bool> {
        self.check()?;
        self.inner.replace(key, value, expire)
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        self.check()?;
        self.inner.delete(key)
    }

    fn increment(&self, key: &str, delta: u64) -> StoreResult<Option<u64>> {
        self.check()?;
        self.inner.increment(key, delta)
    }

    fn decrement(&self, key: &str, delta: u64) -> StoreResult<Option<u64>> {
        self.check()?;
        self.inner.decrement(key, delta)
    }

    fn flush(&self) -> StoreResult<()> {
        self.check()?;
        self.inner.flush()
    }
}

/// A store that counts the calls reaching it.
#[derive(Clone, Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    calls: Arc<AtomicUsize>,
    batches: Arc<AtomicUsize>,
}

impl RecordingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Every call, batch calls included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `get_multi` and `set_multi` calls.
    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn hit_batch(&self) {
        self.hit();
        self.batches.fetch_add(1, Ordering::SeqCst);
    }
}

impl RemoteStore for RecordingStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.hit();
        self.inner.get(key)
    }

    fn get_multi(&self, keys: &[&str]) -> StoreResult<HashMap<String, Vec<u8>>> {
        self.hit_batch();
        self.inner.get_multi(keys)
    }

    fn set(&self, key: &str, value: &[u8], expire: u32) -> StoreResult<()> {
        self.hit();
        self.inner.set(key, value, expire)
    }

    fn set_multi(&self, items: &[(&str, &[u8])], expire: u32) -> StoreResult<()> {
        self.hit_batch();
        self.inner.set_multi(items, expire)
    }

    fn add(&self, key: &str, value: &[u8], expire: u32) -> StoreResult<bool> {
        self.hit();
        self.inner.add(key, value, expire)
    }

    fn replace(&self, key: &str, value: &[u8], expire: u32) -> StoreResult<bool> {
        self.hit();
        self.inner.replace(key, value, expire)
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        self.hit();
        self.inner.delete(key)
    }

    fn increment(&self, key: &str, delta: u64) -> StoreResult<Option<u64>> {
        self.hit();
        self.inner.increment(key, delta)
    }

    fn decrement(&self, key: &str, delta: u64) -> StoreResult<Option<u64>> {
        self.hit();
        self.inner.decrement(key, delta)
    }

    fn flush(&self) -> StoreResult<()> {
        self.hit();
        self.inner.flush()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for cache inputs.

    use proptest::prelude::*;
    use serde_json::Value;

    /// Object ids as hosts use them: numeric or slug-like, sometimes with
    /// stray whitespace.
    pub fn arb_id() -> impl Strategy<Value = String> {
        prop_oneof![
            any::<u32>().prop_map(|n| n.to_string()),
            "[a-z0-9_-]{1,16}",
            "[a-z]{1,6} [a-z]{1,6}",
        ]
    }

    /// Group names, including the empty group.
    pub fn arb_group() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            Just("default".to_string()),
            "[a-z][a-z_-]{0,11}",
        ]
    }

    /// Tenant ids for multi-tenant namespaces.
    pub fn arb_tenant_id() -> impl Strategy<Value = String> {
        "[1-9][0-9]{0,5}"
    }

    /// Values that read back as themselves: never empty or falsy.
    pub fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Bool(true)),
            (1i64..1_000_000).prop_map(Value::from),
            "[a-zA-Z][a-zA-Z0-9 ]{0,23}".prop_map(Value::from),
        ];

        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 1..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,8}", inner, 0..4)
                    .prop_map(|map| Value::Object(map.into_iter().collect())),
            ]
        })
    }

    /// Counter start values and deltas that stay clear of overflow.
    pub fn arb_counter() -> impl Strategy<Value = (u64, u64)> {
        (0u64..1_000_000, 0u64..1_000)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built clients for common scenarios.

    use super::*;

    /// A client over a single in-memory default bucket. The store handle is
    /// shared with the client.
    pub fn memory_client() -> (CacheClient, MemoryStore) {
        memory_client_with(CacheConfig::default())
    }

    /// Like [`memory_client`] with a custom config.
    pub fn memory_client_with(config: CacheConfig) -> (CacheClient, MemoryStore) {
        let store = MemoryStore::new();
        let client = client_over(&config, Arc::new(store.clone()));
        (client, store)
    }

    /// A client whose default bucket can be taken offline.
    pub fn flaky_client() -> (CacheClient, FlakyStore) {
        let store = FlakyStore::new(MemoryStore::new());
        let client = client_over(&CacheConfig::default(), Arc::new(store.clone()));
        (client, store)
    }

    /// A client whose default bucket counts calls.
    pub fn recording_client() -> (CacheClient, RecordingStore) {
        let store = RecordingStore::new(MemoryStore::new());
        let client = client_over(&CacheConfig::default(), Arc::new(store.clone()));
        (client, store)
    }

    /// Two tenants of one multi-tenant host sharing one remote bucket.
    pub fn tenant_pair(a: &str, b: &str) -> (CacheClient, CacheClient, MemoryStore) {
        let store = MemoryStore::new();
        let tenant = |id: &str| {
            CacheConfig::default().with_tenant(TenantMode::MultiTenant {
                tenant_id: id.to_string(),
            })
        };
        let first = client_over(&tenant(a), Arc::new(store.clone()));
        let second = client_over(&tenant(b), Arc::new(store.clone()));
        (first, second, store)
    }

    /// A client over an explicit default store.
    pub fn client_over(config: &CacheConfig, store: Arc<dyn RemoteStore>) -> CacheClient {
        CacheClient::new(config, BucketRouter::new(store))
            .expect("fixture config should be valid")
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for cache results.

    use super::*;

    /// Assert that a read came back with a value.
    pub fn assert_hit<T: std::fmt::Debug>(read: &CacheRead<T>) {
        assert!(read.is_hit(), "Expected a cache hit, got {:?}", read);
    }

    /// Assert that a read found nothing at all.
    pub fn assert_not_found<T: std::fmt::Debug>(read: &CacheRead<T>) {
        assert!(
            !read.found() && !read.is_hit(),
            "Expected not found, got {:?}",
            read
        );
    }

    /// Assert a cached negative: found, but no usable value.
    pub fn assert_cached_false<T: std::fmt::Debug>(read: &CacheRead<T>) {
        assert!(
            read.found() && !read.is_hit(),
            "Expected a cached false, got {:?}",
            read
        );
    }

    /// Assert that a result is a codec error.
    pub fn assert_codec_error<T: std::fmt::Debug>(result: &CacheResult<T>) {
        assert!(
            matches!(result, Err(CacheError::Codec(_))),
            "Expected CodecError, got {:?}",
            result
        );
    }

    /// Assert the counters a client has recorded.
    pub fn assert_stats(stats: &CacheStats, get: u64, set: u64, miss: u64) {
        assert_eq!(
            (stats.get, stats.set, stats.miss),
            (get, set, miss),
            "Unexpected (get, set, miss) counters in {:?}",
            stats
        );
    }
}
