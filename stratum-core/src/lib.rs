//! stratum core - shared types for the two-tier object cache.
//!
//! Pure data: key construction, group classification, configuration,
//! statistics and the error taxonomy. No I/O happens in this crate; the
//! client and the remote stores live in `stratum-storage`.

pub mod config;
pub mod error;
pub mod groups;
pub mod key;
pub mod stats;

pub use config::{
    parse_buckets, CacheConfig, KeyNamespace, ServerAddr, TenantMode, DEFAULT_HOST, DEFAULT_PORT,
    MAX_RELATIVE_EXPIRATION,
};
pub use error::{CacheError, CacheResult, CodecError, ConfigError, StoreError, StoreResult};
pub use groups::{normalize_group, GroupNames, GroupSet, DEFAULT_GROUP};
pub use key::CacheKey;
pub use stats::{CacheStats, Diagnostics, GroupOp, GroupOps, OpKind};
