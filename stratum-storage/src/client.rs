//! The two-tier cache client.
//!
//! Every read and write goes through the process-local tier first and the
//! remote bucket for the key's group second. Remote failures never surface
//! as errors: they are logged and reported as a miss or as `false`, the same
//! way a plain cache miss would be. Only caller mistakes (a value that
//! cannot be encoded, a cached value that does not fit the requested type,
//! a bad configuration) are returned as `Err`.
//!
//! # Example
//!
//! ```ignore
//! let mut cache = CacheClient::new(&config, router)?;
//! cache.add_non_persistent_groups("counts");
//!
//! cache.set(42, &post, "posts", 0)?;
//! let read = cache.get::<Post>(42, "posts", ReadPolicy::PreferLocal)?;
//! ```

use std::fmt::Display;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use stratum_core::{
    normalize_group, CacheConfig, CacheKey, CacheResult, CacheStats, Diagnostics, GroupNames,
    GroupOps, GroupSet, KeyNamespace, OpKind,
};

use crate::codec;
use crate::local::{LocalCache, LocalEntry};
use crate::read::{CacheRead, ReadPolicy, ReadSource};
use crate::remote::RemoteStore;
use crate::router::{Bucket, BucketRouter};

/// Direction of a counter update.
#[derive(Debug, Clone, Copy)]
enum Counter {
    Incr,
    Decr,
}

/// A cache client for one unit of work (a request, a job).
///
/// The local tier and the statistics belong to this client; the remote
/// buckets are shared with every other client built from the same router.
pub struct CacheClient {
    namespace: KeyNamespace,
    groups: GroupSet,
    router: BucketRouter,
    local: LocalCache,
    diagnostics: Diagnostics,
    config: CacheConfig,
}

impl CacheClient {
    /// Create a client over an already built routing table.
    pub fn new(config: &CacheConfig, router: BucketRouter) -> CacheResult<Self> {
        config.validate()?;

        tracing::debug!(
            buckets = ?router,
            flush_enabled = config.flush_enabled,
            "Cache client created"
        );

        Ok(Self {
            namespace: config.namespace(),
            groups: GroupSet::new(),
            router,
            local: LocalCache::new(),
            diagnostics: Diagnostics::default(),
            config: config.clone(),
        })
    }

    /// Connect every configured bucket and create a client over them.
    pub fn connect(config: &CacheConfig) -> CacheResult<Self> {
        let router = BucketRouter::connect(config)?;
        Self::new(config, router)
    }

    // ========================================================================
    // Keys and groups
    // ========================================================================

    /// The full key for `id` in `group`.
    pub fn key(&self, id: impl Display, group: &str) -> CacheKey {
        CacheKey::new(&self.namespace, &self.groups, &id.to_string(), group)
    }

    /// Mark groups as shared by every tenant.
    pub fn add_global_groups<G: GroupNames>(&mut self, groups: G) {
        self.groups.add_global(groups);
    }

    /// Mark groups as local-only: never read from or written to the remote
    /// store.
    pub fn add_non_persistent_groups<G: GroupNames>(&mut self, groups: G) {
        self.groups.add_non_persistent(groups);
    }

    /// Get the client configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn groups(&self) -> &GroupSet {
        &self.groups
    }

    pub fn namespace(&self) -> &KeyNamespace {
        &self.namespace
    }

    /// A shared handle to the remote store serving `group`.
    pub fn bucket(&self, group: &str) -> Arc<dyn RemoteStore> {
        self.router.resolve(group).handle()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Read one value.
    ///
    /// With [`ReadPolicy::PreferLocal`] a local entry answers directly,
    /// including a cached negative (`found` with no value). Otherwise the
    /// remote store is asked and the local tier refreshed from its answer.
    /// A key marked for pending invalidation is evicted and reported as a
    /// miss.
    pub fn get<T: DeserializeOwned>(
        &mut self,
        id: impl Display,
        group: &str,
        policy: impl Into<ReadPolicy>,
    ) -> CacheResult<CacheRead<T>> {
        let policy = policy.into();
        let group = normalize_group(group);
        let id = id.to_string();
        let key = self.key(&id, group);
        let non_persistent = self.groups.is_non_persistent(group);
        let use_local = !policy.is_forced() || non_persistent;

        let (value, found, source) = match self.local.get(&key).cloned() {
            Some(LocalEntry::PendingInvalidation) if use_local => {
                tracing::debug!(key = %key, "Bypassing key pending invalidation");
                self.local.remove(&key);
                (None, false, ReadSource::Local)
            }
            Some(entry) if use_local => (entry.value(), true, ReadSource::Local),
            None if non_persistent => {
                self.local.store_missing(key.clone());
                (None, false, ReadSource::Local)
            }
            _ => {
                let (value, found) = self.fetch_remote(&key, group);
                (value, found, ReadSource::Remote)
            }
        };

        if found {
            self.diagnostics.record(group, OpKind::Get, id);
        } else {
            self.diagnostics.record_miss();
        }

        let value = codec::typed(&key, value)?;
        Ok(CacheRead::new(value, found, source))
    }

    /// Ask the remote store for `key` and refresh the local tier.
    fn fetch_remote(&mut self, key: &CacheKey, group: &str) -> (Option<Value>, bool) {
        let bucket = self.router.resolve(group).clone();

        let bytes = match bucket.store().get(key.as_str()) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                self.local.store_missing(key.clone());
                return (None, false);
            }
            Err(e) => {
                tracing::warn!(key = %key, bucket = bucket.name(), error = %e, "Remote get failed");
                return (None, false);
            }
        };

        match codec::decode(key, &bytes) {
            Ok(value) if codec::is_miss_value(&value) => {
                self.local.store_missing(key.clone());
                (None, true)
            }
            Ok(value) => {
                self.local.store(key.clone(), value.clone());
                (Some(value), true)
            }
            Err(e) => {
                tracing::warn!(key = %key, bucket = bucket.name(), error = %e, "Undecodable remote value");
                (None, false)
            }
        }
    }

    /// Read many values, keyed by cache key.
    ///
    /// Pairs with an empty group use `default_group`. Keys the local tier
    /// can answer come first, in request order; the rest are fetched in one
    /// batch from the bucket of the last group in the input and follow in
    /// request order. Look results up with [`CacheClient::key`].
    pub fn get_multi<K, T>(
        &mut self,
        pairs: &[(K, &str)],
        default_group: &str,
    ) -> CacheResult<IndexMap<CacheKey, Option<T>>>
    where
        K: Display,
        T: DeserializeOwned,
    {
        let default_group = normalize_group(default_group);
        let mut answers: IndexMap<CacheKey, Option<Value>> = IndexMap::new();
        let mut queued: IndexSet<CacheKey> = IndexSet::new();
        let mut last: Option<(String, String)> = None;

        for (id, group) in pairs {
            let group = if group.is_empty() {
                default_group
            } else {
                normalize_group(group)
            };
            let id = id.to_string();
            let key = self.key(&id, group);

            match self.local.get(&key).map(LocalEntry::value) {
                Some(value) => {
                    answers.insert(key.clone(), value);
                }
                None if self.groups.is_non_persistent(group) => {
                    self.local.store_missing(key.clone());
                    answers.insert(key.clone(), None);
                }
                None => {
                    queued.insert(key);
                }
            }

            last = Some((group.to_string(), id));
        }

        self.diagnostics.count(OpKind::GetMulti);
        let Some((last_group, last_id)) = last else {
            return Ok(IndexMap::new());
        };
        self.diagnostics
            .group_ops
            .push(&last_group, OpKind::GetMulti, last_id);

        if !queued.is_empty() {
            let bucket = self.router.resolve(&last_group).clone();
            self.fetch_remote_batch(&bucket, queued, &mut answers);
        }

        let mut results = IndexMap::with_capacity(answers.len());
        for (key, value) in answers {
            let value = codec::typed(&key, value)?;
            results.insert(key, value);
        }
        Ok(results)
    }

    /// Fetch `queued` from `bucket` in one round trip.
    fn fetch_remote_batch(
        &mut self,
        bucket: &Bucket,
        queued: IndexSet<CacheKey>,
        answers: &mut IndexMap<CacheKey, Option<Value>>,
    ) {
        let keys: Vec<&str> = queued.iter().map(CacheKey::as_str).collect();

        let mut found = match bucket.store().get_multi(&keys) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(
                    bucket = bucket.name(),
                    keys = keys.len(),
                    error = %e,
                    "Remote get_multi failed"
                );
                for key in queued {
                    answers.insert(key, None);
                }
                return;
            }
        };

        for key in queued {
            let value = match found.remove(key.as_str()) {
                None => {
                    self.local.store_missing(key.clone());
                    None
                }
                Some(bytes) => match codec::decode(&key, &bytes) {
                    Ok(value) => {
                        self.local.store(key.clone(), value.clone());
                        Some(value)
                    }
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "Undecodable remote value");
                        None
                    }
                },
            };
            answers.insert(key, value);
        }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Store a value in both tiers.
    ///
    /// Refused (`Ok(false)`) while the key is pending invalidation. The
    /// local tier is written even when the remote write fails.
    pub fn set<T: Serialize + ?Sized>(
        &mut self,
        id: impl Display,
        data: &T,
        group: &str,
        expire: u32,
    ) -> CacheResult<bool> {
        let group = normalize_group(group);
        let id = id.to_string();
        let key = self.key(&id, group);

        if self.local.is_pending(&key) {
            tracing::debug!(key = %key, "Refusing set on key pending invalidation");
            return Ok(false);
        }

        let value = codec::to_value(&key, data)?;
        let bytes = codec::encode(&key, &value)?;
        self.local.store(key.clone(), value);

        if self.groups.is_non_persistent(group) {
            return Ok(true);
        }

        let bucket = self.router.resolve(group).clone();
        let expire = self.config.resolve_expiration(expire);
        match bucket.store().set(key.as_str(), &bytes, expire) {
            Ok(()) => {
                self.diagnostics.record(group, OpKind::Set, id);
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(key = %key, bucket = bucket.name(), error = %e, "Remote set failed");
                Ok(false)
            }
        }
    }

    /// Store many values. Items with an empty group use `default_group`.
    ///
    /// Items pending invalidation are skipped. Remote-bound items go out in
    /// one call to the bucket of the last group in the input.
    pub fn set_multi<K, T>(
        &mut self,
        items: &[(K, T, &str)],
        expire: u32,
        default_group: &str,
    ) -> CacheResult<bool>
    where
        K: Display,
        T: Serialize,
    {
        let default_group = normalize_group(default_group);

        // Encode everything first so a bad item leaves both tiers untouched.
        let mut prepared = Vec::with_capacity(items.len());
        for (id, data, group) in items {
            let group = if group.is_empty() {
                default_group
            } else {
                normalize_group(group)
            };
            let id = id.to_string();
            let key = self.key(&id, group);
            let value = codec::to_value(&key, data)?;
            let bytes = codec::encode(&key, &value)?;
            prepared.push((group, id, key, value, bytes));
        }

        let Some(last_group) = prepared.last().map(|(group, ..)| *group) else {
            return Ok(true);
        };

        let mut remote = Vec::with_capacity(prepared.len());
        for (group, id, key, value, bytes) in prepared {
            if self.local.is_pending(&key) {
                tracing::debug!(key = %key, "Skipping key pending invalidation");
                continue;
            }
            self.local.store(key.clone(), value);
            if !self.groups.is_non_persistent(group) {
                remote.push((group, id, key, bytes));
            }
        }

        if remote.is_empty() {
            return Ok(true);
        }

        let bucket = self.router.resolve(last_group).clone();
        let expire = self.config.resolve_expiration(expire);
        let batch: Vec<(&str, &[u8])> = remote
            .iter()
            .map(|(_, _, key, bytes)| (key.as_str(), bytes.as_slice()))
            .collect();

        match bucket.store().set_multi(&batch, expire) {
            Ok(()) => {
                for (group, id, ..) in &remote {
                    self.diagnostics.record(group, OpKind::Set, id.as_str());
                }
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(
                    bucket = bucket.name(),
                    keys = batch.len(),
                    error = %e,
                    "Remote set_multi failed"
                );
                Ok(false)
            }
        }
    }

    /// Store a value only if the key does not exist yet.
    ///
    /// A usable local entry answers `false` without asking the remote store.
    pub fn add<T: Serialize + ?Sized>(
        &mut self,
        id: impl Display,
        data: &T,
        group: &str,
        expire: u32,
    ) -> CacheResult<bool> {
        let group = normalize_group(group);
        let id = id.to_string();
        let key = self.key(&id, group);
        let value = codec::to_value(&key, data)?;

        if self.groups.is_non_persistent(group) {
            self.local.store(key, value);
            return Ok(true);
        }

        if self.local.get(&key).is_some_and(|entry| !entry.is_false()) {
            return Ok(false);
        }

        let bytes = codec::encode(&key, &value)?;
        let bucket = self.router.resolve(group).clone();
        let expire = self.config.resolve_expiration(expire);
        match bucket.store().add(key.as_str(), &bytes, expire) {
            Ok(true) => {
                self.diagnostics.record(group, OpKind::Add, id);
                self.local.store(key, value);
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) => {
                tracing::warn!(key = %key, bucket = bucket.name(), error = %e, "Remote add failed");
                Ok(false)
            }
        }
    }

    /// Store a value only if the key already exists remotely.
    pub fn replace<T: Serialize + ?Sized>(
        &mut self,
        id: impl Display,
        data: &T,
        group: &str,
        expire: u32,
    ) -> CacheResult<bool> {
        let group = normalize_group(group);
        let key = self.key(id, group);
        let value = codec::to_value(&key, data)?;
        let bytes = codec::encode(&key, &value)?;

        let bucket = self.router.resolve(group).clone();
        let expire = self.config.resolve_expiration(expire);
        match bucket.store().replace(key.as_str(), &bytes, expire) {
            Ok(true) => {
                self.local.store(key, value);
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) => {
                tracing::warn!(key = %key, bucket = bucket.name(), error = %e, "Remote replace failed");
                Ok(false)
            }
        }
    }

    /// Delete a key. The local entry goes only once the remote store
    /// confirms.
    pub fn delete(&mut self, id: impl Display, group: &str) -> bool {
        let group = normalize_group(group);
        let id = id.to_string();
        let key = self.key(&id, group);

        if self.groups.is_non_persistent(group) {
            self.local.remove(&key);
            return true;
        }

        let bucket = self.router.resolve(group).clone();
        match bucket.store().delete(key.as_str()) {
            Ok(true) => {
                self.diagnostics.record(group, OpKind::Delete, id);
                self.local.remove(&key);
                true
            }
            Ok(false) => false,
            Err(e) => {
                tracing::warn!(key = %key, bucket = bucket.name(), error = %e, "Remote delete failed");
                false
            }
        }
    }

    /// Add `n` to a remote counter. `None` when the key does not exist.
    pub fn incr(&mut self, id: impl Display, n: u64, group: &str) -> Option<u64> {
        self.adjust(id, n, group, Counter::Incr)
    }

    /// Subtract `n` from a remote counter, saturating at 0. `None` when the
    /// key does not exist.
    pub fn decr(&mut self, id: impl Display, n: u64, group: &str) -> Option<u64> {
        self.adjust(id, n, group, Counter::Decr)
    }

    fn adjust(&mut self, id: impl Display, n: u64, group: &str, counter: Counter) -> Option<u64> {
        let key = self.key(id, group);
        let bucket = self.router.resolve(group).clone();

        let result = match counter {
            Counter::Incr => bucket.store().increment(key.as_str(), n),
            Counter::Decr => bucket.store().decrement(key.as_str(), n),
        };

        match result {
            Ok(Some(value)) => {
                self.local.store(key, Value::from(value));
                Some(value)
            }
            Ok(None) => {
                self.local.store_missing(key);
                None
            }
            Err(e) => {
                tracing::warn!(
                    key = %key,
                    bucket = bucket.name(),
                    op = ?counter,
                    error = %e,
                    "Remote counter update failed"
                );
                None
            }
        }
    }

    /// Flush every remote bucket.
    ///
    /// When flushing is disabled this reports success without touching
    /// anything. The local tier is left as is either way.
    pub fn flush(&mut self) -> bool {
        if !self.config.flush_enabled {
            tracing::debug!("Flush disabled, skipping");
            return true;
        }

        let mut ok = true;
        for bucket in self.router.buckets() {
            if let Err(e) = bucket.store().flush() {
                tracing::warn!(bucket = bucket.name(), error = %e, "Remote flush failed");
                ok = false;
            }
        }
        ok
    }

    /// Release the client. Remote connections are pooled and outlive it.
    pub fn close(&mut self) -> bool {
        true
    }

    /// Mark a key as dirty in the local tier.
    ///
    /// The next read bypasses and evicts the entry; until then `set`
    /// refuses to overwrite it.
    pub fn mark_pending_invalidation(&mut self, id: impl Display, group: &str) {
        let key = self.key(id, group);
        self.local.mark_pending(key);
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    pub fn stats(&self) -> &CacheStats {
        &self.diagnostics.stats
    }

    pub fn group_ops(&self) -> &GroupOps {
        &self.diagnostics.group_ops
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Successful single-key reads.
    pub fn cache_hits(&self) -> u64 {
        self.diagnostics.stats.get
    }

    pub fn cache_misses(&self) -> u64 {
        self.diagnostics.stats.miss
    }

    /// Number of keys held by the local tier.
    pub fn local_len(&self) -> usize {
        self.local.len()
    }
}

impl std::fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheClient")
            .field("namespace", &self.namespace)
            .field("buckets", &self.router)
            .field("local_len", &self.local.len())
            .field("stats", &self.diagnostics.stats)
            .finish()
    }
}
