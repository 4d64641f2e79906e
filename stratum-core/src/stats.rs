//! Cache statistics and the per-group operation log.
//!
//! Both are diagnostics only. They are `Serialize` so a host can render
//! them however it likes; nothing in the cache reads them back.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Counters for the lifetime of a client. They only ever grow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Reads answered with a value (or a known negative) by either tier.
    pub get: u64,
    /// Batched reads, counted once per call.
    pub get_multi: u64,
    /// Successful remote adds.
    pub add: u64,
    /// Successful remote sets.
    pub set: u64,
    /// Successful remote deletes.
    pub delete: u64,
    /// Reads that found nothing.
    pub miss: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.get + self.miss;
        if total == 0 {
            0.0
        } else {
            self.get as f64 / total as f64
        }
    }

    pub(crate) fn bump(&mut self, kind: OpKind) {
        match kind {
            OpKind::Get => self.get += 1,
            OpKind::GetMulti => self.get_multi += 1,
            OpKind::Add => self.add += 1,
            OpKind::Set => self.set += 1,
            OpKind::Delete => self.delete += 1,
        }
    }
}

/// Operations recorded in the group log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Get,
    GetMulti,
    Add,
    Set,
    Delete,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Get => "get",
            OpKind::GetMulti => "get_multi",
            OpKind::Add => "add",
            OpKind::Set => "set",
            OpKind::Delete => "delete",
        }
    }
}

/// One logged operation, rendered as `"<op> <id>"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupOp {
    pub kind: OpKind,
    pub id: String,
}

impl fmt::Display for GroupOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.as_str(), self.id)
    }
}

/// Ordered per-group log of operations. Groups keep first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupOps {
    groups: IndexMap<String, Vec<GroupOp>>,
}

impl GroupOps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, group: &str, kind: OpKind, id: impl Into<String>) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .push(GroupOp {
                kind,
                id: id.into(),
            });
    }

    /// Operations logged for `group`, oldest first.
    pub fn for_group(&self, group: &str) -> &[GroupOp] {
        self.groups.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[GroupOp])> {
        self.groups.iter().map(|(g, ops)| (g.as_str(), ops.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Stats plus the operation log, recorded together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub stats: CacheStats,
    pub group_ops: GroupOps,
}

impl Diagnostics {
    /// Count `kind` and log it against `group`.
    pub fn record(&mut self, group: &str, kind: OpKind, id: impl Into<String>) {
        self.stats.bump(kind);
        self.group_ops.push(group, kind, id);
    }

    /// Count `kind` without logging it.
    pub fn count(&mut self, kind: OpKind) {
        self.stats.bump(kind);
    }

    /// Count a miss. Misses are not logged.
    pub fn record_miss(&mut self) {
        self.stats.miss += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            get: 80,
            miss: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_group_op_display() {
        let op = GroupOp {
            kind: OpKind::GetMulti,
            id: "42".to_string(),
        };
        assert_eq!(op.to_string(), "get_multi 42");
    }

    #[test]
    fn test_record_counts_and_logs() {
        let mut diag = Diagnostics::default();
        diag.record("posts", OpKind::Get, "1");
        diag.record("posts", OpKind::Delete, "1");
        diag.record("users", OpKind::Add, "7");
        diag.record_miss();

        assert_eq!(diag.stats.get, 1);
        assert_eq!(diag.stats.delete, 1);
        assert_eq!(diag.stats.add, 1);
        assert_eq!(diag.stats.miss, 1);

        let posts: Vec<String> = diag
            .group_ops
            .for_group("posts")
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(posts, vec!["get 1", "delete 1"]);
        assert!(diag.group_ops.for_group("missing").is_empty());
    }

    #[test]
    fn test_group_order_is_first_seen() {
        let mut ops = GroupOps::new();
        ops.push("zeta", OpKind::Get, "1");
        ops.push("alpha", OpKind::Get, "2");
        ops.push("zeta", OpKind::Set, "3");

        let groups: Vec<&str> = ops.iter().map(|(g, _)| g).collect();
        assert_eq!(groups, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_stats_serialize() {
        let stats = CacheStats {
            get: 3,
            ..Default::default()
        };
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["get"], 3);
        assert_eq!(json["get_multi"], 0);
    }
}
