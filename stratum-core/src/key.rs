//! Cache key construction.
//!
//! Every operation on the same `(id, group)` pair must address the same
//! entry, in the local tier and in the remote store. [`CacheKey::new`] is the
//! only way to build a key, so the rendering rule lives in exactly one place:
//!
//! ```text
//! salt + prefix + group + ":" + id        (ASCII whitespace removed)
//! ```
//!
//! where `prefix` is the namespace's global prefix for global groups and the
//! tenant prefix otherwise.

use std::borrow::Borrow;
use std::fmt;

use crate::config::KeyNamespace;
use crate::groups::{normalize_group, GroupSet};

/// A fully rendered cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    rendered: String,
}

impl CacheKey {
    /// Build the key for `id` in `group`.
    ///
    /// An empty group is treated as `"default"`.
    pub fn new(namespace: &KeyNamespace, groups: &GroupSet, id: &str, group: &str) -> Self {
        let group = normalize_group(group);
        let prefix = if groups.is_global(group) {
            &namespace.global_prefix
        } else {
            &namespace.tenant_prefix
        };

        let rendered = [
            namespace.salt.as_str(),
            prefix.as_str(),
            group,
            ":",
            id,
        ]
        .iter()
        .flat_map(|part| part.chars())
        .filter(|c| !is_key_whitespace(*c))
        .collect();

        Self { rendered }
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    pub fn into_string(self) -> String {
        self.rendered
    }
}

/// The characters stripped from keys: ASCII space, tab, line feed, vertical
/// tab, form feed and carriage return. Unicode spaces stay part of the key.
fn is_key_whitespace(c: char) -> bool {
    c.is_ascii_whitespace() || c == '\x0B'
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.rendered
    }
}

impl Borrow<str> for CacheKey {
    fn borrow(&self) -> &str {
        &self.rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TenantMode;

    fn tenant(id: &str) -> KeyNamespace {
        KeyNamespace::new(
            "",
            &TenantMode::MultiTenant {
                tenant_id: id.to_string(),
            },
        )
    }

    #[test]
    fn test_key_layout() {
        let ns = KeyNamespace::new(
            "salt_",
            &TenantMode::SingleTenant {
                table_prefix: "wp_".to_string(),
            },
        );
        let groups = GroupSet::new();

        let key = CacheKey::new(&ns, &groups, "42", "posts");
        assert_eq!(key.as_str(), "salt_wp_:posts:42");
    }

    #[test]
    fn test_empty_group_is_default() {
        let ns = KeyNamespace::default();
        let groups = GroupSet::new();

        assert_eq!(
            CacheKey::new(&ns, &groups, "a", ""),
            CacheKey::new(&ns, &groups, "a", "default")
        );
        assert_eq!(CacheKey::new(&ns, &groups, "a", "").as_str(), "default:a");
    }

    #[test]
    fn test_whitespace_is_stripped() {
        let ns = KeyNamespace::new(" s ", &TenantMode::Unscoped);
        let groups = GroupSet::new();

        let key = CacheKey::new(&ns, &groups, "my key\twith\nspaces", "post meta");
        assert_eq!(key.as_str(), "spostmeta:mykeywithspaces");
    }

    #[test]
    fn test_only_ascii_whitespace_is_stripped() {
        let ns = KeyNamespace::new("", &TenantMode::Unscoped);
        let groups = GroupSet::new();

        let key = CacheKey::new(&ns, &groups, "a\x0Bb\x0Cc\rd", "posts");
        assert_eq!(key.as_str(), "posts:abcd");

        let key = CacheKey::new(&ns, &groups, "a\u{00A0}b\u{2003}c", "posts");
        assert_eq!(key.as_str(), "posts:a\u{00A0}b\u{2003}c");
    }

    #[test]
    fn test_global_group_shared_across_tenants() {
        let mut groups = GroupSet::new();
        groups.add_global("users");

        let a = CacheKey::new(&tenant("1"), &groups, "9", "users");
        let b = CacheKey::new(&tenant("2"), &groups, "9", "users");
        assert_eq!(a, b);
    }

    #[test]
    fn test_tenant_group_differs_across_tenants() {
        let groups = GroupSet::new();

        let a = CacheKey::new(&tenant("1"), &groups, "9", "posts");
        let b = CacheKey::new(&tenant("2"), &groups, "9", "posts");
        assert_ne!(a, b);
        assert_eq!(a.as_str(), "1:posts:9");
    }
}
