//! The process-local cache tier.

use std::collections::HashMap;

use serde_json::Value;
use stratum_core::CacheKey;

/// State of one key in the local tier.
///
/// A key with no entry at all is "absent": the local tier knows nothing and
/// the remote store must be asked.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalEntry {
    /// Known not to exist (a cached negative result).
    Missing,
    /// A cached value.
    Value(Value),
    /// Marked dirty: reads must bypass the cache and blind writes are
    /// refused until a read clears the mark.
    PendingInvalidation,
}

impl LocalEntry {
    /// Whether this entry counts as "false" for add-if-absent checks.
    pub fn is_false(&self) -> bool {
        matches!(self, LocalEntry::Missing | LocalEntry::Value(Value::Bool(false)))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, LocalEntry::PendingInvalidation)
    }

    /// A deep copy of the cached value, if any.
    pub fn value(&self) -> Option<Value> {
        match self {
            LocalEntry::Value(value) => Some(value.clone()),
            LocalEntry::Missing | LocalEntry::PendingInvalidation => None,
        }
    }
}

/// Key to entry map. Owned by one client; no locking.
#[derive(Debug, Default, Clone)]
pub struct LocalCache {
    entries: HashMap<CacheKey, LocalEntry>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<&LocalEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_pending(&self, key: &CacheKey) -> bool {
        self.entries.get(key).is_some_and(LocalEntry::is_pending)
    }

    /// Store a value. The caller hands over its own copy.
    pub fn store(&mut self, key: CacheKey, value: Value) {
        self.entries.insert(key, LocalEntry::Value(value));
    }

    /// Remember that `key` does not exist.
    pub fn store_missing(&mut self, key: CacheKey) {
        self.entries.insert(key, LocalEntry::Missing);
    }

    pub fn mark_pending(&mut self, key: CacheKey) {
        self.entries.insert(key, LocalEntry::PendingInvalidation);
    }

    pub fn remove(&mut self, key: &CacheKey) -> Option<LocalEntry> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
