//! Cache configuration.
//!
//! The host supplies everything the client needs at construction time: the
//! key salt, the tenant mode that derives the key prefixes, the bucket table
//! and the default expiration. Configuration is validated once, before any
//! bucket is connected.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::groups::DEFAULT_GROUP;

/// Port used when a server entry has no usable port.
pub const DEFAULT_PORT: u16 = 11211;

/// Host used when no server list is configured at all.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Expirations above this many seconds are absolute unix timestamps.
pub const MAX_RELATIVE_EXPIRATION: u32 = 60 * 60 * 24 * 30;

// ============================================================================
// SERVER ADDRESSES
// ============================================================================

/// One remote cache server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerAddr {
    pub host: String,
    pub port: u16,
}

impl ServerAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host` or `host:port`.
    ///
    /// A missing, unparsable or zero port falls back to [`DEFAULT_PORT`].
    pub fn parse(entry: &str) -> Result<Self, ConfigError> {
        let entry = entry.trim();
        let (host, port) = match entry.split_once(':') {
            Some((host, port)) => (host, port.trim().parse::<u16>().unwrap_or(0)),
            None => (entry, 0),
        };

        if host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "server".to_string(),
                value: entry.to_string(),
                reason: "host must not be empty".to_string(),
            });
        }

        let port = if port == 0 { DEFAULT_PORT } else { port };
        Ok(Self::new(host.trim(), port))
    }
}

impl fmt::Display for ServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ============================================================================
// KEY NAMESPACE
// ============================================================================

/// How this process is scoped among tenants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TenantMode {
    /// No tenant scoping: both prefixes are empty.
    #[default]
    Unscoped,
    /// One tenant per cache cluster, identified by its table prefix.
    SingleTenant { table_prefix: String },
    /// Many tenants share the cluster; global groups are shared by all.
    MultiTenant { tenant_id: String },
}

/// The prefixes that make up a cache key, fixed at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyNamespace {
    pub salt: String,
    /// Prefix for global groups, identical for every tenant.
    pub global_prefix: String,
    /// Prefix for every other group.
    pub tenant_prefix: String,
}

impl KeyNamespace {
    /// Derive the prefixes for a tenant mode.
    pub fn new(salt: impl Into<String>, tenant: &TenantMode) -> Self {
        let (global_prefix, tenant_prefix) = match tenant {
            TenantMode::Unscoped => (String::new(), String::new()),
            TenantMode::SingleTenant { table_prefix } => {
                (table_prefix.clone(), format!("{table_prefix}:"))
            }
            TenantMode::MultiTenant { tenant_id } => (String::new(), format!("{tenant_id}:")),
        };

        Self {
            salt: salt.into(),
            global_prefix,
            tenant_prefix,
        }
    }
}

// ============================================================================
// CACHE CONFIGURATION
// ============================================================================

/// Configuration for the cache client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Prepended to every key, lets several sites share one cluster.
    pub key_salt: String,
    /// Tenant scoping used to derive key prefixes.
    pub tenant: TenantMode,
    /// Bucket name -> servers. Must contain [`DEFAULT_GROUP`].
    pub buckets: BTreeMap<String, Vec<ServerAddr>>,
    /// Expiration in seconds used when a write passes 0.
    pub default_expiration: u32,
    /// Whether `flush` may reach the remote store. Multi-tenant hosts turn
    /// this off so one tenant cannot wipe the shared cluster.
    pub flush_enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let mut buckets = BTreeMap::new();
        buckets.insert(
            DEFAULT_GROUP.to_string(),
            vec![ServerAddr::new(DEFAULT_HOST, DEFAULT_PORT)],
        );

        Self {
            key_salt: String::new(),
            tenant: TenantMode::Unscoped,
            buckets,
            default_expiration: 0,
            flush_enabled: true,
        }
    }
}

impl CacheConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key salt.
    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.key_salt = salt.into();
        self
    }

    /// Set the tenant mode.
    pub fn with_tenant(mut self, tenant: TenantMode) -> Self {
        self.tenant = tenant;
        self
    }

    /// Set (or replace) the servers of one bucket.
    pub fn with_bucket(mut self, name: impl Into<String>, servers: Vec<ServerAddr>) -> Self {
        self.buckets.insert(name.into(), servers);
        self
    }

    /// Use a bare server list as the whole table, mapped to the default bucket.
    pub fn with_servers(mut self, servers: Vec<ServerAddr>) -> Self {
        self.buckets.clear();
        self.buckets.insert(DEFAULT_GROUP.to_string(), servers);
        self
    }

    /// Set the default expiration in seconds.
    pub fn with_default_expiration(mut self, seconds: u32) -> Self {
        self.default_expiration = seconds;
        self
    }

    /// Enable or disable remote flushes.
    pub fn with_flush_enabled(mut self, enabled: bool) -> Self {
        self.flush_enabled = enabled;
        self
    }

    /// The key prefixes derived from salt and tenant mode.
    pub fn namespace(&self) -> KeyNamespace {
        KeyNamespace::new(self.key_salt.clone(), &self.tenant)
    }

    /// Resolve a caller's expiration: 0 means the configured default.
    pub fn resolve_expiration(&self, expire: u32) -> u32 {
        if expire == 0 {
            self.default_expiration
        } else {
            expire
        }
    }

    /// Check the configuration before any bucket is connected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.buckets.contains_key(DEFAULT_GROUP) {
            return Err(ConfigError::MissingDefaultBucket);
        }

        for (bucket, servers) in &self.buckets {
            if servers.is_empty() {
                return Err(ConfigError::EmptyBucket {
                    bucket: bucket.clone(),
                });
            }
        }

        match &self.tenant {
            TenantMode::SingleTenant { table_prefix } if table_prefix.trim().is_empty() => {
                Err(ConfigError::MissingRequired {
                    field: "table_prefix".to_string(),
                })
            }
            TenantMode::MultiTenant { tenant_id } if tenant_id.trim().is_empty() => {
                Err(ConfigError::MissingRequired {
                    field: "tenant_id".to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Create a CacheConfig from environment variables.
    ///
    /// Environment variables:
    /// - `STRATUM_KEY_SALT`: Prepended to every key (default: empty)
    /// - `STRATUM_TENANT_ID`: Multi-tenant mode with this tenant id
    /// - `STRATUM_TABLE_PREFIX`: Single-tenant mode with this table prefix
    ///   (ignored when `STRATUM_TENANT_ID` is set)
    /// - `STRATUM_SERVERS`: Bucket table, see [`parse_buckets`]
    ///   (default: `default=127.0.0.1:11211`)
    /// - `STRATUM_DEFAULT_EXPIRATION`: Seconds (default: 0)
    /// - `STRATUM_FLUSH_ENABLED`: "true" or "false" (default: true)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(salt) = std::env::var("STRATUM_KEY_SALT") {
            config.key_salt = salt;
        }

        let tenant_id = std::env::var("STRATUM_TENANT_ID")
            .ok()
            .filter(|s| !s.trim().is_empty());
        let table_prefix = std::env::var("STRATUM_TABLE_PREFIX")
            .ok()
            .filter(|s| !s.trim().is_empty());
        config.tenant = match (tenant_id, table_prefix) {
            (Some(tenant_id), _) => TenantMode::MultiTenant { tenant_id },
            (None, Some(table_prefix)) => TenantMode::SingleTenant { table_prefix },
            (None, None) => TenantMode::Unscoped,
        };

        if let Ok(servers) = std::env::var("STRATUM_SERVERS") {
            config.buckets = parse_buckets(&servers)?;
        }

        if let Ok(raw) = std::env::var("STRATUM_DEFAULT_EXPIRATION") {
            config.default_expiration =
                raw.trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        field: "STRATUM_DEFAULT_EXPIRATION".to_string(),
                        value: raw.clone(),
                        reason: "must be a number of seconds".to_string(),
                    })?;
        }

        config.flush_enabled = std::env::var("STRATUM_FLUSH_ENABLED")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        config.validate()?;
        Ok(config)
    }
}

/// Parse a bucket table.
///
/// Buckets are separated by `;`, servers by `,`:
/// `default=10.0.0.1:11211,10.0.0.2;sessions=10.0.0.3`.
/// A table without any `name=` part is a bare server list for the default
/// bucket.
pub fn parse_buckets(raw: &str) -> Result<BTreeMap<String, Vec<ServerAddr>>, ConfigError> {
    let mut buckets = BTreeMap::new();

    for section in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, servers) = match section.split_once('=') {
            Some((name, servers)) => (name.trim(), servers),
            None => (DEFAULT_GROUP, section),
        };

        let servers = servers
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ServerAddr::parse)
            .collect::<Result<Vec<_>, _>>()?;

        if name.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "STRATUM_SERVERS".to_string(),
                value: section.to_string(),
                reason: "bucket name must not be empty".to_string(),
            });
        }

        buckets
            .entry(name.to_string())
            .or_insert_with(Vec::new)
            .extend(servers);
    }

    Ok(buckets)
}
