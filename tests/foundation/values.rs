//! Integration tests for Value types
//!
//! Tests Value construction, equality, hashing and ordering as used by join
//! keys, plus field type checks.

use ember_foundation::{PMap, PVec, Type, Value};
use std::collections::HashSet;
use std::sync::Arc;

// =============================================================================
// Construction
// =============================================================================

#[test]
fn value_truthiness() {
    assert!(!Value::Nil.is_truthy());
    assert!(!Value::Bool(false).is_truthy());
    assert!(Value::Bool(true).is_truthy());
    assert!(Value::Int(0).is_truthy());
    assert!(Value::from("").is_truthy());
}

#[test]
fn value_accessors() {
    assert_eq!(Value::Int(42).as_int(), Some(42));
    assert_eq!(Value::Int(42).as_float(), None);
    assert_eq!(Value::Int(2).as_number(), Some(2.0));
    assert_eq!(Value::Float(1.5).as_number(), Some(1.5));
    assert_eq!(Value::String(Arc::from("hi")).as_str(), Some("hi"));
    assert_eq!(Value::Bool(true).as_bool(), Some(true));
}

#[test]
fn record_builds_string_keyed_map() {
    let person = Value::record([("id", Value::Int(1)), ("age", Value::Int(20))]);
    assert_eq!(person.get_field("age"), Some(&Value::Int(20)));
    assert_eq!(person.get_field("height"), None);
    assert_eq!(Value::Int(1).get_field("age"), None);
}

#[test]
fn vec_conversion() {
    let v: Value = vec![1i64, 2, 3].into();
    let items = v.as_vec().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items.get(2), Some(&Value::Int(3)));
}

// =============================================================================
// Equality and Hashing
// =============================================================================

#[test]
fn equality_is_by_value() {
    let a = Value::String(Arc::from("key"));
    let b = Value::String(Arc::from(String::from("key")));
    assert_eq!(a, b);
    assert_ne!(Value::Int(1), Value::Float(1.0));
}

#[test]
fn equal_records_hash_equal() {
    let a = Value::record([("x", Value::Int(1)), ("y", Value::Int(2))]);
    let b = Value::record([("y", Value::Int(2)), ("x", Value::Int(1))]);

    let mut set = HashSet::new();
    set.insert(a);
    assert!(set.contains(&b));
}

#[test]
fn nan_is_equal_to_itself() {
    let nan = Value::Float(f64::NAN);
    assert_eq!(nan, nan.clone());
    let mut set = HashSet::new();
    set.insert(nan.clone());
    assert!(set.contains(&nan));
}

#[test]
fn ordering_groups_by_variant() {
    let mut values = vec![
        Value::from("a"),
        Value::Int(2),
        Value::Nil,
        Value::Bool(true),
        Value::Int(-1),
    ];
    values.sort();
    assert_eq!(
        values,
        vec![
            Value::Nil,
            Value::Bool(true),
            Value::Int(-1),
            Value::Int(2),
            Value::from("a"),
        ]
    );
}

// =============================================================================
// Collections
// =============================================================================

#[test]
fn persistent_vec_shares_structure() {
    let v1: PVec<Value> = PVec::new();
    let v2 = v1.push_back(Value::Int(1));
    assert!(v1.is_empty());
    assert_eq!(v2.len(), 1);
    assert!(v2.update(5, Value::Nil).is_none());
}

#[test]
fn persistent_map_is_ordered() {
    let m = PMap::new()
        .insert(Value::from("b"), Value::Int(2))
        .insert(Value::from("a"), Value::Int(1));
    let keys: Vec<_> = m.keys().cloned().collect();
    assert_eq!(keys, vec![Value::from("a"), Value::from("b")]);
}

// =============================================================================
// Types
// =============================================================================

#[test]
fn declared_types_accept_values() {
    assert!(Type::Int.accepts(&Value::Int(1).value_type()));
    assert!(Type::Float.accepts(&Value::Int(1).value_type()));
    assert!(!Type::Int.accepts(&Value::Float(1.0).value_type()));
    assert!(Type::option(Type::String).accepts(&Value::Nil.value_type()));
    assert!(Type::Any.accepts(&Value::from("x").value_type()));
    assert!(Type::vec(Type::Int).accepts(&Value::from(vec![1i64]).value_type()));
}
