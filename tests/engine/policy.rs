//! Integration tests for activation policies
//!
//! Tests the order in which matches reach the policy, vetoes, reordering
//! and activation callbacks.

use std::sync::{Arc, Mutex};

use ember_engine::{ActivationPolicy, Agenda, AgendaEntry, Knowledge, RuleBuilder, Session};
use ember_foundation::{FactHandle, Type, Value};
use ember_memory::FactTypeSchema;

#[derive(Clone, Default)]
struct Seen(Arc<Mutex<Vec<String>>>);

impl Seen {
    fn push(&self, line: String) {
        self.0.lock().unwrap().push(line);
    }

    fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

fn n(v: i64) -> Value {
    Value::record([("n", Value::Int(v))])
}

/// `first` (salience 1) and `second` both delete every Item they match.
fn session() -> Session {
    let knowledge = Knowledge::builder()
        .declare(FactTypeSchema::new("Item").with_field("n", Type::Int))
        .rule(
            RuleBuilder::new("first")
                .fact("$i", "Item")
                .salience(1)
                .when(["$i.n"], |v| v[0].as_int().is_some_and(|n| n % 2 == 0))
                .execute(|ctx| ctx.delete("$i")),
        )
        .rule(
            RuleBuilder::new("second")
                .fact("$i", "Item")
                .execute(|ctx| ctx.delete("$i")),
        )
        .build()
        .unwrap();
    knowledge.new_session().unwrap()
}

// =============================================================================
// Agenda Order
// =============================================================================

struct RecordAgenda(Seen);

impl ActivationPolicy for RecordAgenda {
    fn on_agenda(&mut self, pass: u64, agenda: &mut Agenda) {
        for entry in agenda.iter() {
            let handles: Vec<u64> = entry
                .bindings()
                .iter()
                .flat_map(|b| b.handles())
                .map(|h| h.id)
                .collect();
            self.0.push(format!("{pass} {} {handles:?}", entry.rule().name));
        }
    }
}

#[test]
fn matches_reach_the_policy_in_insertion_order() {
    let seen = Seen::default();
    let mut session = session();
    session.set_policy(RecordAgenda(seen.clone()));

    let handles: Vec<FactHandle> = [4, 1, 2]
        .into_iter()
        .map(|v| session.insert("Item", n(v)).unwrap())
        .collect();
    let ids: Vec<u64> = handles.iter().map(|h| h.id).collect();
    session.fire().unwrap();

    assert_eq!(
        seen.lines(),
        vec![
            format!("1 first {:?}", vec![ids[0], ids[2]]),
            format!("1 second {ids:?}"),
        ]
    );
}

// =============================================================================
// Vetoes and Reordering
// =============================================================================

struct Veto(&'static str);

impl ActivationPolicy for Veto {
    fn test(&mut self, entry: &AgendaEntry) -> bool {
        &*entry.rule().name != self.0
    }
}

#[test]
fn vetoed_entries_do_not_fire() {
    let mut session = session();
    session.set_policy(Veto("first"));
    for v in 0..4 {
        session.insert("Item", n(v)).unwrap();
    }
    let report = session.fire().unwrap();

    // `second` deletes everything on its own.
    assert_eq!(report.activations, 1);
    assert!(session.facts("Item").unwrap().is_empty());
}

struct Reverse(Seen);

impl ActivationPolicy for Reverse {
    fn on_agenda(&mut self, _pass: u64, agenda: &mut Agenda) {
        agenda.sort_by(|a, b| a.rule().salience.cmp(&b.rule().salience));
    }

    fn on_activation(&mut self, entry: &AgendaEntry, actions: usize) {
        self.0.push(format!("{} {actions}", entry.rule().name));
    }
}

#[test]
fn policies_may_reorder_the_agenda() {
    let seen = Seen::default();
    let mut session = session();
    session.set_policy(Reverse(seen.clone()));
    for v in 0..4 {
        session.insert("Item", n(v)).unwrap();
    }
    session.fire().unwrap();

    // `second` runs first and deletes all four; `first` finds only stale
    // bindings and never activates.
    assert_eq!(seen.lines(), vec!["second 4".to_string()]);
}

#[test]
fn activations_count_queued_actions() {
    let seen = Seen::default();
    let mut session = session();
    session.set_policy(DefaultOrder(seen.clone()));
    for v in 0..4 {
        session.insert("Item", n(v)).unwrap();
    }
    session.fire().unwrap();

    assert_eq!(
        seen.lines(),
        vec!["first 2".to_string(), "second 2".to_string()]
    );
}

struct DefaultOrder(Seen);

impl ActivationPolicy for DefaultOrder {
    fn on_activation(&mut self, entry: &AgendaEntry, actions: usize) {
        self.0.push(format!("{} {actions}", entry.rule().name));
    }
}
