//! In-process remote store.
//!
//! Implements [`RemoteStore`] with memcached semantics over a locked hash
//! map. Useful for single-process deployments that still want the remote
//! tier's conditional writes and counters, and as the backing store of
//! every test in the workspace.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use stratum_core::{StoreError, StoreResult, MAX_RELATIVE_EXPIRATION};

use crate::remote::RemoteStore;

#[derive(Debug, Clone)]
struct StoredItem {
    value: Vec<u8>,
    /// Unix seconds; `None` never expires.
    expires_at: Option<i64>,
}

impl StoredItem {
    fn is_live(&self, now: i64) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Turn a memcached-style expiration into an absolute deadline.
fn deadline(expire: u32, now: i64) -> Option<i64> {
    match expire {
        0 => None,
        e if e <= MAX_RELATIVE_EXPIRATION => Some(now + i64::from(e)),
        e => Some(i64::from(e)),
    }
}

fn parse_counter(key: &str, value: &[u8]) -> StoreResult<u64> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .ok_or_else(|| StoreError::NonNumeric {
            key: key.to_string(),
        })
}

/// Memcached-semantics store held in process memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    items: Arc<RwLock<HashMap<String, StoredItem>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Utc::now().timestamp();
        self.items
            .read()
            .map(|items| items.values().filter(|i| i.is_live(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a live value is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        matches!(self.get(key), Ok(Some(_)))
    }

    fn write_with<R>(
        &self,
        f: impl FnOnce(&mut HashMap<String, StoredItem>, i64) -> R,
    ) -> StoreResult<R> {
        let mut items = self.items.write().map_err(|_| StoreError::LockPoisoned)?;
        Ok(f(&mut items, Utc::now().timestamp()))
    }

    fn adjust(&self, key: &str, apply: impl FnOnce(u64) -> u64) -> StoreResult<Option<u64>> {
        self.write_with(|items, now| -> StoreResult<Option<u64>> {
            let item = match items.get_mut(key) {
                Some(item) if item.is_live(now) => item,
                _ => return Ok(None),
            };

            let next = apply(parse_counter(key, &item.value)?);
            item.value = next.to_string().into_bytes();
            Ok(Some(next))
        })?
    }
}

impl RemoteStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let items = self.items.read().map_err(|_| StoreError::LockPoisoned)?;
        let now = Utc::now().timestamp();
        Ok(items
            .get(key)
            .filter(|item| item.is_live(now))
            .map(|item| item.value.clone()))
    }

    fn get_multi(&self, keys: &[&str]) -> StoreResult<HashMap<String, Vec<u8>>> {
        let items = self.items.read().map_err(|_| StoreError::LockPoisoned)?;
        let now = Utc::now().timestamp();
        Ok(keys
            .iter()
            .filter_map(|key| {
                items
                    .get(*key)
                    .filter(|item| item.is_live(now))
                    .map(|item| (key.to_string(), item.value.clone()))
            })
            .collect())
    }

    fn set(&self, key: &str, value: &[u8], expire: u32) -> StoreResult<()> {
        self.write_with(|items, now| {
            items.insert(
                key.to_string(),
                StoredItem {
                    value: value.to_vec(),
                    expires_at: deadline(expire, now),
                },
            );
        })
    }

    fn set_multi(&self, entries: &[(&str, &[u8])], expire: u32) -> StoreResult<()> {
        self.write_with(|items, now| {
            for (key, value) in entries {
                items.insert(
                    key.to_string(),
                    StoredItem {
                        value: value.to_vec(),
                        expires_at: deadline(expire, now),
                    },
                );
            }
        })
    }

    fn add(&self, key: &str, value: &[u8], expire: u32) -> StoreResult<bool> {
        self.write_with(|items, now| {
            if items.get(key).is_some_and(|item| item.is_live(now)) {
                return false;
            }
            items.insert(
                key.to_string(),
                StoredItem {
                    value: value.to_vec(),
                    expires_at: deadline(expire, now),
                },
            );
            true
        })
    }

    fn replace(&self, key: &str, value: &[u8], expire: u32) -> StoreResult<bool> {
        self.write_with(|items, now| match items.get_mut(key) {
            Some(item) if item.is_live(now) => {
                item.value = value.to_vec();
                item.expires_at = deadline(expire, now);
                true
            }
            _ => false,
        })
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        self.write_with(|items, now| {
            items
                .remove(key)
                .is_some_and(|item| item.is_live(now))
        })
    }

    fn increment(&self, key: &str, delta: u64) -> StoreResult<Option<u64>> {
        self.adjust(key, |current| current.wrapping_add(delta))
    }

    fn decrement(&self, key: &str, delta: u64) -> StoreResult<Option<u64>> {
        self.adjust(key, |current| current.saturating_sub(delta))
    }

    fn flush(&self) -> StoreResult<()> {
        self.write_with(|items, _| items.clear())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_delete() {
        let store = MemoryStore::new();
        store.set("k", b"v", 0).unwrap();

        assert_eq!(store.get("k").unwrap(), Some(b"v".to_vec()));
        assert!(store.delete("k").unwrap());
        assert!(!store.delete("k").unwrap());
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_falsy_value_is_not_absence() {
        let store = MemoryStore::new();
        store.set("zero", b"0", 0).unwrap();

        assert_eq!(store.get("zero").unwrap(), Some(b"0".to_vec()));
        assert_eq!(store.get("absent").unwrap(), None);
    }

    #[test]
    fn test_add_and_replace_are_conditional() {
        let store = MemoryStore::new();

        assert!(!store.replace("k", b"1", 0).unwrap());
        assert!(store.add("k", b"1", 0).unwrap());
        assert!(!store.add("k", b"2", 0).unwrap());
        assert_eq!(store.get("k").unwrap(), Some(b"1".to_vec()));

        assert!(store.replace("k", b"3", 0).unwrap());
        assert_eq!(store.get("k").unwrap(), Some(b"3".to_vec()));
    }

    #[test]
    fn test_counters() {
        let store = MemoryStore::new();
        assert_eq!(store.increment("n", 1).unwrap(), None);

        store.set("n", b"10", 0).unwrap();
        assert_eq!(store.increment("n", 5).unwrap(), Some(15));
        assert_eq!(store.decrement("n", 20).unwrap(), Some(0));
        assert_eq!(store.get("n").unwrap(), Some(b"0".to_vec()));
    }

    #[test]
    fn test_counter_rejects_non_numeric() {
        let store = MemoryStore::new();
        store.set("s", b"\"text\"", 0).unwrap();

        assert_eq!(
            store.increment("s", 1),
            Err(StoreError::NonNumeric {
                key: "s".to_string()
            })
        );
    }

    #[test]
    fn test_absolute_expiration_in_the_past() {
        let store = MemoryStore::new();
        // Above 30 days the value is a unix timestamp; this one is in 1970.
        store.set("old", b"v", MAX_RELATIVE_EXPIRATION + 1).unwrap();

        assert_eq!(store.get("old").unwrap(), None);
        assert!(store.add("old", b"new", 0).unwrap());
    }

    #[test]
    fn test_relative_expiration_keeps_value() {
        let store = MemoryStore::new();
        store.set("fresh", b"v", 60).unwrap();

        assert!(store.contains("fresh"));
    }

    #[test]
    fn test_get_multi_skips_missing() {
        let store = MemoryStore::new();
        store
            .set_multi(&[("a", b"1".as_slice()), ("b", b"2".as_slice())], 0)
            .unwrap();

        let found = store.get_multi(&["a", "missing", "b"]).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found["b"], b"2".to_vec());
    }

    #[test]
    fn test_flush_clears_everything() {
        let store = MemoryStore::new();
        store.set("a", b"1", 0).unwrap();
        store.set("b", b"2", 0).unwrap();

        store.flush().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_clones_share_data() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.set("k", b"v", 0).unwrap();

        assert!(other.contains("k"));
    }
}
