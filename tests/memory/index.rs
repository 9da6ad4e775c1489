//! Integration tests for FactIndex
//!
//! Tests composite keys, lazy deletion, delta merging and compaction.

use ember_foundation::{FactHandle, Value};
use ember_memory::{FactIndex, MemoryKey};
use proptest::prelude::*;

fn h(id: u64) -> FactHandle {
    FactHandle::new(id, 0)
}

fn key(values: &[i64]) -> MemoryKey {
    let values: Vec<Value> = values.iter().copied().map(Value::Int).collect();
    MemoryKey::from_values(&values)
}

// =============================================================================
// Keys
// =============================================================================

#[test]
fn key_variants_by_arity() {
    assert!(key(&[]).is_empty());
    assert!(matches!(key(&[1]), MemoryKey::Single(_)));
    assert!(matches!(key(&[1, 2]), MemoryKey::Multi(_)));
    assert_eq!(key(&[1, 2]).len(), 2);
    assert_eq!(key(&[1, 2]).get(1), Some(&Value::Int(2)));
}

#[test]
fn projected_keys_equal_built_keys() {
    let fields = [Value::Int(9), Value::from("x"), Value::Int(3)];
    let projected = MemoryKey::project(&fields, &[2, 0]);
    assert_eq!(projected, key(&[3, 9]));
    assert_ne!(projected, key(&[9, 3]));
}

// =============================================================================
// Insert / Lookup
// =============================================================================

#[test]
fn composite_keys_group_handles() {
    let mut index = FactIndex::new();
    index.insert(key(&[1, 2]), h(1));
    index.insert(key(&[1, 2]), h(2));
    index.insert(key(&[2, 1]), h(3));

    assert_eq!(index.key_count(), 2);
    assert_eq!(index.lookup(&key(&[1, 2])).collect::<Vec<_>>(), vec![h(1), h(2)]);
    assert_eq!(index.lookup(&key(&[3, 3])).count(), 0);
}

#[test]
fn handles_are_ordered_by_fact_id() {
    let mut index = FactIndex::new();
    index.insert(key(&[1]), h(1));
    index.insert(key(&[1]), h(2));

    // A replaced version keeps the slot of its fact id.
    assert!(index.remove(&key(&[1]), h(1)));
    index.insert(key(&[1]), h(1).next_version());
    index.insert(key(&[1]), FactHandle::new(0, 0));

    assert_eq!(
        index.lookup(&key(&[1])).collect::<Vec<_>>(),
        vec![FactHandle::new(0, 0), h(1).next_version(), h(2)]
    );
}

#[test]
fn remove_requires_matching_version() {
    let mut index = FactIndex::new();
    index.insert(key(&[1]), h(1));

    assert!(!index.remove(&key(&[1]), h(1).next_version()));
    assert!(index.remove(&key(&[1]), h(1)));
    assert!(!index.remove(&key(&[1]), h(1)));
}

#[test]
fn emptied_keys_stay_until_compaction() {
    let mut index = FactIndex::new();
    index.insert(key(&[1]), h(1));
    index.insert(key(&[2]), h(2));
    index.remove(&key(&[1]), h(1));

    assert_eq!(index.key_count(), 2);
    assert!(!index.has_live(&key(&[1])));
    assert_eq!(index.live_keys().count(), 1);

    // Reinserting under the emptied key reuses the entry.
    assert!(index.insert(key(&[1]), h(3)));
    assert_eq!(index.key_count(), 2);

    index.remove(&key(&[1]), h(3));
    assert_eq!(index.compact(), 1);
    assert_eq!(index.key_count(), 1);
    assert!(index.entry(&key(&[1])).is_none());
    assert!(index.has_live(&key(&[2])));
}

// =============================================================================
// Merge
// =============================================================================

#[test]
fn merge_empties_the_delta() {
    let mut main = FactIndex::new();
    let mut delta = FactIndex::new();
    main.insert(key(&[1]), h(1));
    delta.insert(key(&[1]), h(2));
    delta.insert(key(&[5]), h(3));

    main.merge(&mut delta);

    assert!(delta.is_empty());
    assert_eq!(delta.key_count(), 0);
    assert_eq!(main.handle_count(), 3);
    assert_eq!(main.lookup(&key(&[1])).count(), 2);
}

#[test]
fn clear_drops_everything() {
    let mut index = FactIndex::with_capacity(4);
    index.insert(key(&[1]), h(1));
    index.clear();
    assert_eq!(index.key_count(), 0);
    assert!(index.is_empty());
}

proptest! {
    #[test]
    fn merging_twice_equals_merging_once(
        pairs in prop::collection::vec((0i64..8, 0u64..32), 0..40),
    ) {
        let build = || {
            let mut delta = FactIndex::new();
            for (k, id) in &pairs {
                delta.insert(key(&[*k]), h(*id));
            }
            delta
        };

        let mut once = FactIndex::new();
        once.merge(&mut build());

        let mut twice = FactIndex::new();
        twice.merge(&mut build());
        twice.merge(&mut build());

        prop_assert_eq!(once.handle_count(), twice.handle_count());
        prop_assert_eq!(once.key_count(), twice.key_count());
        for entry in once.entries() {
            let a: Vec<_> = entry.handles().collect();
            let b: Vec<_> = twice.lookup(entry.key()).collect();
            prop_assert_eq!(a, b);
        }
    }

    #[test]
    fn merge_order_does_not_change_contents(
        left in prop::collection::vec((0i64..6, 0u64..20), 0..20),
        right in prop::collection::vec((0i64..6, 0u64..20), 0..20),
    ) {
        let index_of = |pairs: &[(i64, u64)]| {
            let mut index = FactIndex::new();
            for (k, id) in pairs {
                index.insert(key(&[*k]), h(*id));
            }
            index
        };

        let mut ab = index_of(&left);
        ab.merge(&mut index_of(&right));
        let mut ba = index_of(&right);
        ba.merge(&mut index_of(&left));

        prop_assert_eq!(ab.handle_count(), ba.handle_count());
        for entry in ab.entries() {
            let a: Vec<_> = entry.handles().collect();
            let b: Vec<_> = ba.lookup(entry.key()).collect();
            prop_assert_eq!(a, b);
        }
    }
}
