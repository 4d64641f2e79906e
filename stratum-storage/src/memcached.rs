//! Memcached buckets, backed by the `memcache` crate.
//!
//! Compiled only with the `memcached` feature. One [`MemcachedStore`] wraps
//! the pooled client for every server of one bucket; the crate shards keys
//! across those servers.

use std::collections::HashMap;

use memcache::{Client, CommandError, MemcacheError};
use stratum_core::{ServerAddr, StoreError, StoreResult};

use crate::remote::RemoteStore;

/// A memcached bucket.
pub struct MemcachedStore {
    bucket: String,
    client: Client,
}

impl MemcachedStore {
    /// Connect to every server of `bucket`.
    pub fn connect(bucket: &str, servers: &[ServerAddr]) -> StoreResult<Self> {
        let urls: Vec<String> = servers
            .iter()
            .map(|server| format!("memcache://{server}"))
            .collect();

        let client = Client::connect(urls).map_err(|e| StoreError::Unreachable {
            server: servers
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
            reason: e.to_string(),
        })?;

        tracing::info!(bucket, servers = servers.len(), "Connected memcached bucket");

        Ok(Self {
            bucket: bucket.to_string(),
            client,
        })
    }

    fn backend_error(&self, e: MemcacheError) -> StoreError {
        backend_error(&self.bucket, e)
    }

    fn conditional<T>(&self, result: Result<T, MemcacheError>, refused: T) -> StoreResult<T> {
        conditional(&self.bucket, result, refused)
    }
}

fn backend_error(bucket: &str, e: MemcacheError) -> StoreError {
    StoreError::Backend {
        bucket: bucket.to_string(),
        reason: e.to_string(),
    }
}

/// Map a conditional reply. The binary protocol answers a refused add with
/// `KeyExists` and a replace, delete or counter on a missing key with
/// `KeyNotFound`; both are answers, not failures.
fn conditional<T>(bucket: &str, result: Result<T, MemcacheError>, refused: T) -> StoreResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(MemcacheError::CommandError(CommandError::KeyNotFound | CommandError::KeyExists)) => {
            Ok(refused)
        }
        Err(e) => Err(backend_error(bucket, e)),
    }
}

impl RemoteStore for MemcachedStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.client
            .get::<Vec<u8>>(key)
            .map_err(|e| self.backend_error(e))
    }

    fn get_multi(&self, keys: &[&str]) -> StoreResult<HashMap<String, Vec<u8>>> {
        self.client
            .gets::<Vec<u8>>(keys)
            .map_err(|e| self.backend_error(e))
    }

    fn set(&self, key: &str, value: &[u8], expire: u32) -> StoreResult<()> {
        self.client
            .set(key, value, expire)
            .map_err(|e| self.backend_error(e))
    }

    fn set_multi(&self, items: &[(&str, &[u8])], expire: u32) -> StoreResult<()> {
        for (key, value) in items {
            self.set(key, value, expire)?;
        }
        Ok(())
    }

    fn add(&self, key: &str, value: &[u8], expire: u32) -> StoreResult<bool> {
        self.conditional(self.client.add(key, value, expire).map(|()| true), false)
    }

    fn replace(&self, key: &str, value: &[u8], expire: u32) -> StoreResult<bool> {
        self.conditional(self.client.replace(key, value, expire).map(|()| true), false)
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        self.conditional(self.client.delete(key), false)
    }

    fn increment(&self, key: &str, delta: u64) -> StoreResult<Option<u64>> {
        self.conditional(self.client.increment(key, delta).map(Some), None)
    }

    fn decrement(&self, key: &str, delta: u64) -> StoreResult<Option<u64>> {
        self.conditional(self.client.decrement(key, delta).map(Some), None)
    }

    fn flush(&self) -> StoreResult<()> {
        self.client.flush().map_err(|e| self.backend_error(e))
    }
}
