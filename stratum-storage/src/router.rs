//! Group to bucket routing.
//!
//! A bucket is a named remote store. A group is served by the bucket of the
//! same name when one exists, otherwise by `"default"`, which always exists.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use stratum_core::{
    normalize_group, CacheConfig, CacheError, CacheResult, ConfigError, DEFAULT_GROUP,
};

use crate::remote::RemoteStore;

/// An owned handle to one bucket's remote store.
#[derive(Clone)]
pub struct Bucket {
    name: String,
    store: Arc<dyn RemoteStore>,
}

impl Bucket {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &dyn RemoteStore {
        self.store.as_ref()
    }

    /// A shared handle to the store, independent of the routing table.
    pub fn handle(&self) -> Arc<dyn RemoteStore> {
        Arc::clone(&self.store)
    }
}

impl fmt::Debug for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bucket").field("name", &self.name).finish()
    }
}

/// The routing table. Immutable once built.
#[derive(Clone)]
pub struct BucketRouter {
    default: Bucket,
    named: BTreeMap<String, Bucket>,
}

impl BucketRouter {
    /// A table with only the default bucket.
    pub fn new(default: Arc<dyn RemoteStore>) -> Self {
        Self {
            default: Bucket {
                name: DEFAULT_GROUP.to_string(),
                store: default,
            },
            named: BTreeMap::new(),
        }
    }

    /// Add a bucket serving the group of the same name.
    ///
    /// Adding `"default"` replaces the default bucket.
    pub fn with_bucket(mut self, name: impl Into<String>, store: Arc<dyn RemoteStore>) -> Self {
        let name = name.into();
        if name == DEFAULT_GROUP {
            self.default.store = store;
        } else {
            self.named.insert(name.clone(), Bucket { name, store });
        }
        self
    }

    /// Build a table from already connected stores.
    pub fn from_stores(stores: BTreeMap<String, Arc<dyn RemoteStore>>) -> CacheResult<Self> {
        let mut stores = stores;
        let default = stores
            .remove(DEFAULT_GROUP)
            .ok_or(CacheError::Config(ConfigError::MissingDefaultBucket))?;

        Ok(stores
            .into_iter()
            .fold(Self::new(default), |router, (name, store)| {
                router.with_bucket(name, store)
            }))
    }

    /// Connect every configured bucket to memcached.
    ///
    /// Fails as a whole if any bucket fails; a partially connected table is
    /// never returned.
    #[cfg(feature = "memcached")]
    pub fn connect(config: &CacheConfig) -> CacheResult<Self> {
        config.validate()?;

        let mut stores: BTreeMap<String, Arc<dyn RemoteStore>> = BTreeMap::new();
        for (name, servers) in &config.buckets {
            let store = crate::memcached::MemcachedStore::connect(name, servers).map_err(|e| {
                tracing::warn!(bucket = %name, error = %e, "Failed to connect bucket");
                e
            })?;
            stores.insert(name.clone(), Arc::new(store));
        }

        Self::from_stores(stores)
    }

    /// Without the `memcached` feature there is no remote store to connect.
    #[cfg(not(feature = "memcached"))]
    pub fn connect(config: &CacheConfig) -> CacheResult<Self> {
        config.validate()?;
        Err(CacheError::BackendUnavailable {
            reason: "memcached support is not compiled in (enable the `memcached` feature)"
                .to_string(),
        })
    }

    /// The bucket serving `group`.
    pub fn resolve(&self, group: &str) -> &Bucket {
        self.named
            .get(normalize_group(group))
            .unwrap_or(&self.default)
    }

    /// Every bucket, default first.
    pub fn buckets(&self) -> impl Iterator<Item = &Bucket> {
        std::iter::once(&self.default).chain(self.named.values())
    }

    pub fn bucket_names(&self) -> impl Iterator<Item = &str> {
        self.buckets().map(Bucket::name)
    }
}

impl fmt::Debug for BucketRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.bucket_names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[test]
    fn test_unmapped_group_routes_to_default() {
        let router = BucketRouter::new(Arc::new(MemoryStore::new()))
            .with_bucket("sessions", Arc::new(MemoryStore::new()));

        assert_eq!(router.resolve("posts").name(), "default");
        assert_eq!(router.resolve("").name(), "default");
        assert_eq!(router.resolve("sessions").name(), "sessions");
        assert_eq!(
            router.bucket_names().collect::<Vec<_>>(),
            vec!["default", "sessions"]
        );
    }

    #[test]
    fn test_from_stores_requires_default() {
        let mut stores: BTreeMap<String, Arc<dyn RemoteStore>> = BTreeMap::new();
        stores.insert("sessions".to_string(), Arc::new(MemoryStore::new()));

        assert!(matches!(
            BucketRouter::from_stores(stores),
            Err(CacheError::Config(ConfigError::MissingDefaultBucket))
        ));
    }

    #[test]
    fn test_handle_is_independent_of_table() {
        let store = MemoryStore::new();
        let router = BucketRouter::new(Arc::new(store.clone()));

        let handle = router.resolve("posts").handle();
        handle.set("k", b"v", 0).unwrap();
        assert!(store.contains("k"));
    }

    #[cfg(not(feature = "memcached"))]
    #[test]
    fn test_connect_without_backend_is_unavailable() {
        let result = BucketRouter::connect(&CacheConfig::default());
        assert!(matches!(result, Err(CacheError::BackendUnavailable { .. })));
    }

    #[cfg(not(feature = "memcached"))]
    #[test]
    fn test_connect_validates_config_first() {
        let mut config = CacheConfig::default();
        config.buckets.clear();

        assert!(matches!(
            BucketRouter::connect(&config),
            Err(CacheError::Config(ConfigError::MissingDefaultBucket))
        ));
    }
}
