//! Group classification.
//!
//! A group is the logical namespace of a cache key (think table or resource
//! type). Two host-populated sets change how a group behaves:
//!
//! - **global** groups are shared by every tenant and skip the tenant prefix
//! - **non-persistent** groups live only in the process and never reach the
//!   remote store

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Name used when a caller passes an empty group.
pub const DEFAULT_GROUP: &str = "default";

/// Normalize a group name, mapping the empty name to [`DEFAULT_GROUP`].
pub fn normalize_group(group: &str) -> &str {
    if group.is_empty() {
        DEFAULT_GROUP
    } else {
        group
    }
}

/// Anything that names one or more groups.
///
/// Lets `add_global_groups("users")` and
/// `add_global_groups(["users", "userlogins"])` share one signature.
pub trait GroupNames {
    fn into_group_names(self) -> Vec<String>;
}

impl GroupNames for &str {
    fn into_group_names(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl GroupNames for String {
    fn into_group_names(self) -> Vec<String> {
        vec![self]
    }
}

impl GroupNames for &[&str] {
    fn into_group_names(self) -> Vec<String> {
        self.iter().map(|g| g.to_string()).collect()
    }
}

impl<const N: usize> GroupNames for [&str; N] {
    fn into_group_names(self) -> Vec<String> {
        self.iter().map(|g| g.to_string()).collect()
    }
}

impl GroupNames for Vec<String> {
    fn into_group_names(self) -> Vec<String> {
        self
    }
}

impl GroupNames for Vec<&str> {
    fn into_group_names(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

/// The global and non-persistent group sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSet {
    global: BTreeSet<String>,
    non_persistent: BTreeSet<String>,
}

impl GroupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union `groups` into the global set. Duplicates collapse.
    pub fn add_global<G: GroupNames>(&mut self, groups: G) {
        self.global
            .extend(groups.into_group_names().iter().map(|g| normalize_group(g).to_string()));
    }

    /// Union `groups` into the non-persistent set. Duplicates collapse.
    pub fn add_non_persistent<G: GroupNames>(&mut self, groups: G) {
        self.non_persistent
            .extend(groups.into_group_names().iter().map(|g| normalize_group(g).to_string()));
    }

    pub fn is_global(&self, group: &str) -> bool {
        self.global.contains(normalize_group(group))
    }

    pub fn is_non_persistent(&self, group: &str) -> bool {
        self.non_persistent.contains(normalize_group(group))
    }

    pub fn global(&self) -> impl Iterator<Item = &str> {
        self.global.iter().map(String::as_str)
    }

    pub fn non_persistent(&self) -> impl Iterator<Item = &str> {
        self.non_persistent.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_group() {
        assert_eq!(normalize_group(""), "default");
        assert_eq!(normalize_group("posts"), "posts");
    }

    #[test]
    fn test_single_name_and_sequence() {
        let mut groups = GroupSet::new();
        groups.add_global("users");
        groups.add_global(["userlogins", "usermeta"]);
        groups.add_non_persistent(vec!["counts".to_string()]);

        assert!(groups.is_global("users"));
        assert!(groups.is_global("usermeta"));
        assert!(!groups.is_global("counts"));
        assert!(groups.is_non_persistent("counts"));
        assert!(!groups.is_non_persistent("users"));
    }

    #[test]
    fn test_duplicates_collapse() {
        let mut groups = GroupSet::new();
        groups.add_global(["users", "users"]);
        groups.add_global("users");

        assert_eq!(groups.global().count(), 1);
    }

    #[test]
    fn test_empty_group_is_default() {
        let mut groups = GroupSet::new();
        groups.add_non_persistent(DEFAULT_GROUP);
        groups.add_global("");

        assert!(groups.is_non_persistent(""));
        assert!(groups.is_global(DEFAULT_GROUP));
    }
}
