//! Integration tests for session fact operations
//!
//! Tests insert/update/retract staging, handle versioning, queries and the
//! session lifecycle.

use std::sync::Arc;
use std::thread;

use ember_engine::{Knowledge, RuleBuilder, Session, StopReason};
use ember_foundation::{ErrorKind, Type, Value};
use ember_memory::FactTypeSchema;

fn item(n: i64) -> Value {
    Value::record([("n", Value::Int(n))])
}

fn knowledge() -> Knowledge {
    Knowledge::builder()
        .declare(FactTypeSchema::new("Item").with_field("n", Type::Int))
        .rule(
            RuleBuilder::new("big")
                .fact("$i", "Item")
                .when(["$i.n"], |v| v[0].as_int().is_some_and(|n| n >= 10))
                .build(),
        )
        .build()
        .unwrap()
}

fn session() -> Session {
    knowledge().new_session().unwrap()
}

// =============================================================================
// Staging
// =============================================================================

#[test]
fn inserts_are_visible_after_fire() {
    let mut session = session();
    let h = session.insert("Item", item(1)).unwrap();

    assert_eq!(session.get(h).unwrap(), &item(1));
    assert!(session.facts("Item").unwrap().is_empty());

    session.fire().unwrap();
    let facts = session.facts("Item").unwrap();
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].handle(), h);
}

#[test]
fn unknown_type_is_rejected() {
    let mut session = session();
    let err = session.insert("Ghost", item(1)).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownFactType(_)));
    assert!(session.facts("Ghost").is_err());
}

#[test]
fn badly_typed_fact_is_rejected_at_insert() {
    let mut session = session();
    let err = session
        .insert("Item", Value::record([("n", Value::from("ten"))]))
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::TypeMismatch { .. }));
}

#[test]
fn handles_are_unique() {
    let mut session = session();
    let a = session.insert("Item", item(1)).unwrap();
    let b = session.insert("Item", item(1)).unwrap();
    assert_ne!(a.id, b.id);
}

// =============================================================================
// Versions
// =============================================================================

#[test]
fn update_bumps_the_version() {
    let mut session = session();
    let v0 = session.insert("Item", item(1)).unwrap();
    session.fire().unwrap();

    let v1 = session.update(v0, item(2)).unwrap();
    assert_eq!(v1.id, v0.id);
    assert_eq!(v1.version, v0.version + 1);
    assert_eq!(session.get(v1).unwrap(), &item(2));

    session.fire().unwrap();
    let facts = session.facts("Item").unwrap();
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].handle(), v1);
}

#[test]
fn stale_handles_are_rejected() {
    let mut session = session();
    let v0 = session.insert("Item", item(1)).unwrap();
    let v1 = session.update(v0, item(2)).unwrap();

    for err in [
        session.update(v0, item(3)).unwrap_err(),
        session.retract(v0).unwrap_err(),
        session.get(v0).unwrap_err(),
    ] {
        assert!(matches!(err.kind, ErrorKind::StaleFact(h) if h == v0));
    }
    assert!(session.retract(v1).is_ok());
}

#[test]
fn retracted_facts_are_unknown() {
    let mut session = session();
    let h = session.insert("Item", item(1)).unwrap();
    session.fire().unwrap();
    session.retract(h).unwrap();

    let err = session.update(h, item(2)).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownFact(_)));

    session.fire().unwrap();
    assert!(session.facts("Item").unwrap().is_empty());
    assert!(session.memory().is_empty());
}

#[test]
fn chained_updates_keep_only_the_last_version() {
    let mut session = session();
    let v0 = session.insert("Item", item(1)).unwrap();
    let v1 = session.update(v0, item(2)).unwrap();
    let v2 = session.update(v1, item(3)).unwrap();
    session.fire().unwrap();

    let facts = session.facts("Item").unwrap();
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].handle(), v2);
    assert_eq!(facts[0].value(), &item(3));
}

// =============================================================================
// Queries
// =============================================================================

#[test]
fn matches_reflect_committed_memory() {
    let mut session = session();
    session.insert("Item", item(5)).unwrap();
    let big = session.insert("Item", item(50)).unwrap();
    session.fire().unwrap();

    let matches = session.matches("big").unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].handles(), vec![big]);
    assert!(session.matches("nope").is_err());
    assert!(session.runtime("big").is_some());
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn close_is_idempotent() {
    let knowledge = knowledge();
    let mut session = knowledge.new_session().unwrap();
    assert_eq!(knowledge.open_sessions(), 1);

    assert!(session.close());
    assert!(!session.close());
    assert!(!session.is_active());
    assert_eq!(knowledge.open_sessions(), 0);
}

#[test]
fn closed_sessions_fail_fast() {
    let mut session = session();
    let h = session.insert("Item", item(1)).unwrap();
    session.close();

    let errors = [
        session.insert("Item", item(2)).unwrap_err(),
        session.update(h, item(2)).unwrap_err(),
        session.retract(h).unwrap_err(),
        session.fire().unwrap_err(),
        session.compact().unwrap_err(),
    ];
    for err in errors {
        assert!(matches!(err.kind, ErrorKind::SessionInactive));
    }
    assert!(session.get(h).is_err());
}

#[test]
fn dropping_a_session_closes_it() {
    let knowledge = knowledge();
    let session = knowledge.new_session().unwrap();
    let closer = session.closer();
    assert_eq!(knowledge.open_sessions(), 1);

    drop(session);
    assert_eq!(knowledge.open_sessions(), 0);
    assert!(!closer.is_active());
    assert!(!closer.close());
}

#[test]
fn concurrent_close_tears_down_once() {
    let knowledge = knowledge();
    let session = knowledge.new_session().unwrap();
    let closer = session.closer();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let closer = closer.clone();
            thread::spawn(move || closer.close())
        })
        .collect();
    let closed = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|&won| won)
        .count();

    assert_eq!(closed, 1);
    assert!(!session.is_active());
    assert_eq!(knowledge.open_sessions(), 0);
}

#[test]
fn sessions_share_knowledge_across_threads() {
    let knowledge = Arc::new(knowledge());
    let workers: Vec<_> = (0..4)
        .map(|i| {
            let knowledge = Arc::clone(&knowledge);
            thread::spawn(move || {
                let mut session = knowledge.new_session().unwrap();
                for n in 0..20 {
                    session.insert("Item", item(n + i)).unwrap();
                }
                let report = session.fire().unwrap();
                assert_eq!(report.stop, StopReason::Quiescent);
                session.matches("big").unwrap().len()
            })
        })
        .collect();

    let counts: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    assert_eq!(counts, vec![10, 11, 12, 13]);
    assert_eq!(knowledge.open_sessions(), 0);
}
