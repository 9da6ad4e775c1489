//! Integration tests for the fire loop
//!
//! Tests batch and continuous modes, termination, fire criteria, the
//! activation kill switch and configuration errors.

use std::sync::{Arc, Mutex};

use ember_engine::{
    FireMode, Knowledge, KnowledgeBuilder, RuleBuilder, RuleInfo, Session, SessionListener,
    SessionPhase, StopReason,
};
use ember_foundation::{ErrorKind, SemanticLimit, Type, Value};
use ember_memory::FactTypeSchema;

#[derive(Default)]
struct Activations(Vec<(u64, String)>);

impl SessionListener for Activations {
    fn on_activation(&mut self, pass: u64, rule: &RuleInfo, _actions: usize) {
        self.0.push((pass, rule.name.to_string()));
    }
}

fn n(v: i64) -> Value {
    Value::record([("n", Value::Int(v))])
}

fn types() -> KnowledgeBuilder {
    Knowledge::builder()
        .declare(FactTypeSchema::new("Trigger").with_field("n", Type::Int))
        .declare(FactTypeSchema::new("Marker").with_field("n", Type::Int))
        .declare(FactTypeSchema::new("Log").with_field("n", Type::Int))
}

/// Two rules over the same trigger: `inserter` queues an insert, `logger`
/// (lower salience) only retracts its trigger's log entries.
fn two_rules(mode: &str) -> (Session, Arc<Mutex<Activations>>) {
    let knowledge = types()
        .rule(
            RuleBuilder::new("inserter")
                .fact("$t", "Trigger")
                .salience(10)
                .execute(|ctx| {
                    ctx.insert("Marker", n(1))?;
                    Ok(())
                }),
        )
        .rule(
            RuleBuilder::new("logger")
                .fact("$t", "Trigger")
                .fact("$l", "Log")
                .execute(|ctx| ctx.delete("$l")),
        )
        .property("agenda-mode", mode)
        .build()
        .unwrap();

    let mut session = knowledge.new_session().unwrap();
    let activations = Arc::new(Mutex::new(Activations::default()));
    session.add_listener(Arc::clone(&activations));
    (session, activations)
}

fn fired(activations: &Arc<Mutex<Activations>>) -> Vec<(u64, String)> {
    activations.lock().unwrap().0.clone()
}

// =============================================================================
// Batch vs Continuous
// =============================================================================

#[test]
fn batch_mode_abandons_the_pass_after_an_insert() {
    let (mut session, activations) = two_rules("BATCH");
    session.insert("Log", n(0)).unwrap();
    session.insert("Trigger", n(0)).unwrap();
    let report = session.fire().unwrap();

    // `logger` lost its binding with the abandoned pass and never fires.
    assert_eq!(fired(&activations), vec![(1, "inserter".to_string())]);
    assert_eq!(report.passes, 2);
    assert_eq!(report.activations, 1);
    assert_eq!(session.facts("Log").unwrap().len(), 1);
    assert_eq!(session.facts("Marker").unwrap().len(), 1);

    // Nothing is left over for a later fire.
    let report = session.fire().unwrap();
    assert_eq!(report.passes, 0);
    assert_eq!(fired(&activations).len(), 1);
}

#[test]
fn continuous_mode_fires_the_whole_agenda() {
    let (mut session, activations) = two_rules("CONTINUOUS");
    session.insert("Log", n(0)).unwrap();
    session.insert("Trigger", n(0)).unwrap();
    session.fire().unwrap();

    assert_eq!(
        fired(&activations),
        vec![(1, "inserter".to_string()), (1, "logger".to_string())]
    );
}

/// `eraser` runs first and deletes the log; `reader` matches the same log.
fn eraser_and_reader(mode: &str, reader_updates: bool) -> (Session, Arc<Mutex<Activations>>) {
    let knowledge = types()
        .rule(
            RuleBuilder::new("eraser")
                .fact("$l", "Log")
                .salience(1)
                .execute(|ctx| ctx.delete("$l")),
        )
        .rule(
            RuleBuilder::new("reader")
                .fact("$l", "Log")
                .execute(move |ctx| {
                    if reader_updates {
                        ctx.update("$l", n(9))?;
                    } else {
                        let seen = ctx.field("$l", "n")?;
                        ctx.insert("Marker", Value::record([("n", seen)]))?;
                    }
                    Ok(())
                }),
        )
        .property("agenda-mode", mode)
        .build()
        .unwrap();
    let mut session = knowledge.new_session().unwrap();
    let activations = Arc::new(Mutex::new(Activations::default()));
    session.add_listener(Arc::clone(&activations));
    (session, activations)
}

#[test]
fn continuous_mode_buffers_retractions_until_the_agenda_is_done() {
    let (mut session, activations) = eraser_and_reader("CONTINUOUS", false);
    session.insert("Log", n(7)).unwrap();
    let report = session.fire().unwrap();

    assert_eq!(
        fired(&activations),
        vec![(1, "eraser".to_string()), (1, "reader".to_string())]
    );
    assert_eq!(report.activations, 2);
    assert!(session.facts("Log").unwrap().is_empty());

    let markers = session.facts("Marker").unwrap();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].value().get_field("n"), Some(&Value::Int(7)));
}

#[test]
fn continuous_mode_keeps_the_first_change_to_a_fact() {
    // `reader` tries to update the log `eraser` already deleted: the update
    // is dropped, the fire succeeds and `reader` does not activate.
    let (mut session, activations) = eraser_and_reader("CONTINUOUS", true);
    session.insert("Log", n(7)).unwrap();
    let report = session.fire().unwrap();

    assert_eq!(fired(&activations), vec![(1, "eraser".to_string())]);
    assert_eq!(report.activations, 1);
    assert!(session.facts("Log").unwrap().is_empty());
}

#[test]
fn batch_mode_keeps_firing_without_inserts() {
    // Neither rule inserts, so both fire in the first pass.
    let knowledge = types()
        .rule(
            RuleBuilder::new("drop-markers")
                .fact("$m", "Marker")
                .salience(1)
                .execute(|ctx| ctx.delete("$m")),
        )
        .rule(
            RuleBuilder::new("drop-logs")
                .fact("$l", "Log")
                .execute(|ctx| ctx.delete("$l")),
        )
        .build()
        .unwrap();
    let mut session = knowledge.new_session().unwrap();
    let activations = Arc::new(Mutex::new(Activations::default()));
    session.add_listener(Arc::clone(&activations));

    session.insert("Marker", n(1)).unwrap();
    session.insert("Log", n(1)).unwrap();
    let report = session.fire().unwrap();

    assert_eq!(report.passes, 1);
    assert_eq!(
        fired(&activations),
        vec![(1, "drop-markers".to_string()), (1, "drop-logs".to_string())]
    );
    assert!(session.memory().is_empty());
}

#[test]
fn retractions_are_visible_to_later_rules_in_batch_mode() {
    // `eraser` runs first and removes the log; `reader` then sees a stale
    // binding and does not activate.
    let knowledge = types()
        .rule(
            RuleBuilder::new("eraser")
                .fact("$l", "Log")
                .salience(1)
                .execute(|ctx| ctx.delete("$l")),
        )
        .rule(
            RuleBuilder::new("reader")
                .fact("$l", "Log")
                .execute(|ctx| ctx.update("$l", n(2)).map(|_| ())),
        )
        .build()
        .unwrap();
    let mut session = knowledge.new_session().unwrap();
    session.insert("Log", n(1)).unwrap();
    let report = session.fire().unwrap();

    assert_eq!(report.activations, 1);
    assert!(session.facts("Log").unwrap().is_empty());
}

// =============================================================================
// Termination
// =============================================================================

fn countdown(mode: &str) -> Session {
    let knowledge = Knowledge::builder()
        .declare(FactTypeSchema::new("Counter").with_field("n", Type::Int))
        .rule(
            RuleBuilder::new("countdown")
                .fact("$c", "Counter")
                .when(["$c.n"], |v| v[0].as_int().is_some_and(|n| n > 0))
                .execute(|ctx| {
                    let left = ctx.field("$c", "n")?.as_int().unwrap_or(0);
                    ctx.insert("Counter", n(left - 1))?;
                    Ok(())
                }),
        )
        .property("agenda-mode", mode)
        .build()
        .unwrap();
    knowledge.new_session().unwrap()
}

#[test]
fn self_triggering_rules_converge() {
    for mode in ["BATCH", "CONTINUOUS"] {
        let mut session = countdown(mode);
        session.insert("Counter", n(5)).unwrap();
        let report = session.fire().unwrap();

        assert_eq!(report.stop, StopReason::Quiescent, "{mode}");
        assert_eq!(report.activations, 5, "{mode}");
        assert_eq!(session.facts("Counter").unwrap().len(), 6, "{mode}");
    }
}

#[test]
fn fire_resumes_after_criteria_stop() {
    let mut session = countdown("CONTINUOUS");
    let allowed = Arc::new(Mutex::new(true));
    let gate = Arc::clone(&allowed);
    session.set_fire_criteria(move || *gate.lock().unwrap());
    session.insert("Counter", n(3)).unwrap();

    *allowed.lock().unwrap() = false;
    let report = session.fire().unwrap();
    assert_eq!(report.stop, StopReason::FireCriteria);
    assert_eq!(report.passes, 0);

    *allowed.lock().unwrap() = true;
    let report = session.fire().unwrap();
    assert_eq!(report.stop, StopReason::Quiescent);
    assert_eq!(report.activations, 3);
}

#[test]
fn closing_from_a_listener_stops_the_loop() {
    struct CloseAt(u64, ember_engine::SessionCloser);

    impl SessionListener for CloseAt {
        fn on_phase(&mut self, pass: u64, phase: SessionPhase) {
            if pass == self.0 && phase == SessionPhase::Committing {
                self.1.close();
            }
        }
    }

    let mut session = countdown("CONTINUOUS");
    let closer = session.closer();
    session.add_listener(CloseAt(2, closer));
    session.insert("Counter", n(10)).unwrap();

    let report = session.fire().unwrap();
    assert_eq!(report.stop, StopReason::Closed);
    assert_eq!(report.passes, 2);
    assert!(!session.is_active());
}

#[test]
fn kill_switch_aborts_runaway_rules() {
    let knowledge = Knowledge::builder()
        .declare(FactTypeSchema::new("Counter").with_field("n", Type::Int))
        .rule(
            RuleBuilder::new("forever")
                .fact("$c", "Counter")
                .execute(|ctx| {
                    let left = ctx.field("$c", "n")?.as_int().unwrap_or(0);
                    ctx.update("$c", n(left + 1))?;
                    Ok(())
                }),
        )
        .property("max-activations", "50")
        .build()
        .unwrap();
    let mut session = knowledge.new_session().unwrap();
    session.insert("Counter", n(0)).unwrap();

    let err = session.fire().unwrap_err();
    match err.kind {
        ErrorKind::LimitExceeded(SemanticLimit::MaxActivations { limit, context }) => {
            assert_eq!(limit, 50);
            assert!(context.unwrap().contains("forever"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn modes_parse_case_insensitively() {
    assert_eq!("batch".parse::<FireMode>().unwrap(), FireMode::Batch);
    assert_eq!("Default".parse::<FireMode>().unwrap(), FireMode::Batch);
    assert_eq!(
        "continuous".parse::<FireMode>().unwrap(),
        FireMode::Continuous
    );
}

#[test]
fn unknown_mode_is_fatal() {
    let mut session = countdown("BATCH");
    session.set_property("agenda-mode", "PARALLEL");
    session.insert("Counter", n(1)).unwrap();

    let err = session.fire().unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Config(ref m) if m.contains("PARALLEL")));

    // The queued insert is still pending once the mode is fixed.
    session.set_property("agenda-mode", "CONTINUOUS");
    let report = session.fire().unwrap();
    assert_eq!(report.activations, 1);
}

#[test]
fn knowledge_rejects_invalid_properties_up_front() {
    let knowledge = types()
        .property("max-activations", "lots")
        .build()
        .unwrap();
    let err = knowledge.new_session().unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Config(_)));
    assert_eq!(knowledge.open_sessions(), 0);
}
