//! Property-Based Tests for the two-tier cache client
//!
//! Each property drives a `CacheClient` over in-memory buckets and checks
//! one law of the public contract: read-your-writes with defensive copies,
//! local-only groups, conditional adds, counters, batch/single read
//! agreement, deletes, and tenant key scoping.

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{json, Value};
use stratum_test_utils::assertions::assert_not_found;
use stratum_test_utils::fixtures::{client_over, flaky_client, memory_client, tenant_pair};
use stratum_test_utils::generators::{arb_counter, arb_group, arb_id, arb_tenant_id, arb_value};
use stratum_test_utils::{CacheConfig, ReadPolicy};

/// Change a value in place so it no longer equals the original.
fn mutate(value: &mut Value) {
    match value {
        Value::Array(items) => items.push(json!("mutated")),
        Value::Object(map) => {
            map.insert("__mutated".to_string(), json!(true));
        }
        other => *other = json!({ "mutated": other.clone() }),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: set then get returns an equal value, and mutating what a
    /// read returned never leaks into the next read.
    #[test]
    fn prop_set_get_returns_defensive_copy(
        id in arb_id(),
        group in arb_group(),
        value in arb_value(),
    ) {
        let (mut cache, _store) = memory_client();
        prop_assert!(cache.set(&id, &value, &group, 0).unwrap());

        let mut first: Value = cache
            .get(&id, &group, ReadPolicy::PreferLocal)
            .unwrap()
            .into_value()
            .unwrap();
        prop_assert_eq!(&first, &value);

        mutate(&mut first);

        let second: Option<Value> = cache
            .get(&id, &group, ReadPolicy::PreferLocal)
            .unwrap()
            .into_value();
        prop_assert_eq!(second, Some(value));
    }

    /// Property: non-persistent groups never leave the process, so neither
    /// a flush nor a remote outage changes what a read returns.
    #[test]
    fn prop_non_persistent_survives_flush_and_outage(
        id in arb_id(),
        group in "[a-z]{1,8}",
        value in arb_value(),
    ) {
        let (mut cache, store) = flaky_client();
        cache.add_non_persistent_groups(group.as_str());

        prop_assert!(cache.set(&id, &value, &group, 0).unwrap());
        prop_assert!(store.inner().is_empty());

        prop_assert!(cache.flush());
        store.set_down(true);

        let read: Option<Value> = cache
            .get(&id, &group, ReadPolicy::Force)
            .unwrap()
            .into_value();
        prop_assert_eq!(read, Some(value));
    }

    /// Property: add stores only when the key is absent and never
    /// overwrites an existing value.
    #[test]
    fn prop_add_only_when_absent(
        id in arb_id(),
        group in arb_group(),
        first in arb_value(),
        second in arb_value(),
    ) {
        let (mut cache, _store) = memory_client();

        prop_assert!(cache.add(&id, &first, &group, 0).unwrap());
        prop_assert!(!cache.add(&id, &second, &group, 0).unwrap());

        let read: Option<Value> = cache
            .get(&id, &group, ReadPolicy::Force)
            .unwrap()
            .into_value();
        prop_assert_eq!(read, Some(first));
    }

    /// Property: counters follow the remote store, and the local tier holds
    /// whatever the remote reported.
    #[test]
    fn prop_counter_local_matches_remote(
        id in arb_id(),
        (start, delta) in arb_counter(),
    ) {
        let (mut cache, _store) = memory_client();
        cache.set(&id, &start, "counters", 0).unwrap();

        let up = cache.incr(&id, delta, "counters");
        prop_assert_eq!(up, Some(start + delta));
        let local: Option<u64> = cache.get(&id, "counters", false).unwrap().into_value();
        prop_assert_eq!(local, up);

        let down = cache.decr(&id, delta * 2, "counters");
        prop_assert_eq!(down, Some((start + delta).saturating_sub(delta * 2)));
        let local: Option<u64> = cache.get(&id, "counters", false).unwrap().into_value();
        prop_assert_eq!(local, down);
    }

    /// Property: a batch read and the single reads that follow it agree on
    /// every key, present or not.
    #[test]
    fn prop_get_multi_agrees_with_get(
        stored in prop::collection::btree_map("[a-z0-9]{1,8}", arb_value(), 1..6),
        absent in prop::collection::btree_set("[A-Z]{1,8}", 0..3),
    ) {
        let (mut writer, store) = memory_client();
        for (id, value) in &stored {
            writer.set(id, value, "posts", 0).unwrap();
        }

        let mut reader = client_over(&CacheConfig::default(), Arc::new(store));
        let pairs: Vec<(&String, &str)> = stored
            .keys()
            .chain(absent.iter())
            .map(|id| (id, "posts"))
            .collect();

        let batch = reader.get_multi::<_, Value>(&pairs, "default").unwrap();
        prop_assert_eq!(batch.len(), pairs.len());

        for (id, group) in &pairs {
            let from_batch = batch.get(&reader.key(id, group)).cloned().flatten();
            let single: Option<Value> = reader.get(id, group, false).unwrap().into_value();
            prop_assert_eq!(&single, &from_batch);
            prop_assert_eq!(single, stored.get(*id).cloned());
        }
    }

    /// Property: after a delete, a forced read reports not found.
    #[test]
    fn prop_delete_then_forced_get_not_found(
        id in arb_id(),
        group in arb_group(),
        value in arb_value(),
    ) {
        let (mut cache, _store) = memory_client();
        cache.set(&id, &value, &group, 0).unwrap();

        prop_assert!(cache.delete(&id, &group));

        let read = cache.get::<Value>(&id, &group, ReadPolicy::Force).unwrap();
        assert_not_found(&read);
    }

    /// Property: global groups resolve to the same key for every tenant;
    /// other groups never do.
    #[test]
    fn prop_global_keys_shared_across_tenants(
        tenant_a in arb_tenant_id(),
        tenant_b in arb_tenant_id(),
        id in arb_id(),
    ) {
        prop_assume!(tenant_a != tenant_b);

        let (mut a, mut b, _store) = tenant_pair(&tenant_a, &tenant_b);
        a.add_global_groups("users");
        b.add_global_groups("users");

        prop_assert_eq!(a.key(&id, "users"), b.key(&id, "users"));
        prop_assert_ne!(a.key(&id, "posts"), b.key(&id, "posts"));
    }

    /// Property: a global write by one tenant is visible to the other;
    /// a tenant-scoped write is not.
    #[test]
    fn prop_global_values_visible_across_tenants(
        tenant_a in arb_tenant_id(),
        tenant_b in arb_tenant_id(),
        values in prop::collection::btree_map("[a-z]{1,6}", arb_value(), 1..4),
    ) {
        prop_assume!(tenant_a != tenant_b);

        let (mut a, mut b, _store) = tenant_pair(&tenant_a, &tenant_b);
        a.add_global_groups("users");
        b.add_global_groups("users");

        for (id, value) in &values {
            a.set(id, value, "users", 0).unwrap();
            a.set(id, value, "posts", 0).unwrap();
        }

        for (id, value) in &values {
            let shared: Option<Value> = b.get(id, "users", false).unwrap().into_value();
            prop_assert_eq!(shared.as_ref(), Some(value));

            let scoped = b.get::<Value>(id, "posts", false).unwrap();
            prop_assert!(!scoped.found());
        }
    }
}
