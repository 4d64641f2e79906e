//! Error types for stratum operations

use thiserror::Error;

/// Remote store errors.
///
/// These never escape a cache operation as a fault: the client logs them and
/// reports the operation as failed. They are returned as `Err` only from
/// startup (connecting buckets) and from the stores themselves.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Server unreachable: {server}: {reason}")]
    Unreachable { server: String, reason: String },

    #[error("Backend error in bucket {bucket}: {reason}")]
    Backend { bucket: String, reason: String },

    #[error("Cannot increment or decrement non-numeric value at {key}")]
    NonNumeric { key: String },

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Remote store backend unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("No servers configured for bucket {bucket}")]
    EmptyBucket { bucket: String },

    #[error("Bucket table has no \"default\" bucket")]
    MissingDefaultBucket,
}

/// Value encoding errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Failed to encode value for {key}: {reason}")]
    Encode { key: String, reason: String },

    #[error("Failed to decode value at {key}: {reason}")]
    Decode { key: String, reason: String },
}

/// Master error type for all stratum errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The remote store client library is not compiled in. The host must run
    /// without an external object cache or stop.
    #[error("No external object cache available: {reason}")]
    BackendUnavailable { reason: String },
}

/// Result type alias for stratum operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Result type alias for remote store calls.
pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// TESTS
// =============================================================================
