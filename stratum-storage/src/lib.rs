//! stratum storage - the two-tier object cache client.
//!
//! A [`CacheClient`] answers from its own process-local tier when it can and
//! falls back to a remote memcached-style store otherwise. Remote stores
//! are grouped into named buckets; each cache group is served by the bucket
//! of the same name, or by `"default"`.
//!
//! Remote stores implement [`RemoteStore`]. [`MemoryStore`] is an in-process
//! implementation for tests and single-process hosts; `MemcachedStore` is
//! available with the `memcached` feature.

mod codec;

pub mod client;
pub mod local;
#[cfg(feature = "memcached")]
pub mod memcached;
pub mod memory;
pub mod read;
pub mod remote;
pub mod router;

pub use client::CacheClient;
pub use local::{LocalCache, LocalEntry};
#[cfg(feature = "memcached")]
pub use memcached::MemcachedStore;
pub use memory::MemoryStore;
pub use read::{CacheRead, ReadPolicy, ReadSource};
pub use remote::RemoteStore;
pub use router::{Bucket, BucketRouter};
