//! Integration tests for session tracing
//!
//! Tests the tracer as a session listener: records per pass, fact and
//! activation events, and formatted output.

use std::sync::{Arc, Mutex};

use ember_debug::trace::{TraceEvent, Tracer, TracerConfig};
use ember_debug::{HumanFormatter, JsonFormatter, TraceFormatter};
use ember_engine::{Knowledge, RuleBuilder, SessionPhase, StopReason};
use ember_foundation::{Type, Value};
use ember_memory::FactTypeSchema;

fn countdown() -> Knowledge {
    Knowledge::builder()
        .declare(FactTypeSchema::new("Counter").with_field("n", Type::Int))
        .rule(
            RuleBuilder::new("countdown")
                .fact("$c", "Counter")
                .when(["$c.n"], |v| v[0].as_int().is_some_and(|n| n > 0))
                .execute(|ctx| {
                    let n = ctx.field("$c", "n")?.as_int().unwrap_or(0);
                    ctx.update("$c", Value::record([("n", Value::Int(n - 1))]))?;
                    Ok(())
                }),
        )
        .build()
        .unwrap()
}

fn traced(config: TracerConfig, start: i64) -> Arc<Mutex<Tracer>> {
    let knowledge = countdown();
    let tracer = Arc::new(Mutex::new(Tracer::new(config).with_knowledge(&knowledge)));
    let mut session = knowledge.new_session().unwrap();
    session.add_listener(Arc::clone(&tracer));
    session
        .insert("Counter", Value::record([("n", Value::Int(start))]))
        .unwrap();
    session.fire().unwrap();
    tracer
}

#[test]
fn tracer_records_a_whole_fire() {
    let tracer = traced(TracerConfig::new().enabled(), 2);
    let tracer = tracer.lock().unwrap();
    let buffer = tracer.buffer();

    // n=2 and n=1 activate; each update retracts and reinserts.
    assert_eq!(buffer.by_event_type("rule-activated").len(), 2);
    assert_eq!(buffer.by_event_type("fact-inserted").len(), 3);
    assert_eq!(buffer.by_event_type("fact-retracted").len(), 2);

    let end = buffer.by_event_type("fire-end");
    assert_eq!(end.len(), 1);
    match &end[0].event {
        TraceEvent::FireEnd {
            passes,
            activations,
            stop,
        } => {
            assert_eq!(*passes, 3);
            assert_eq!(*activations, 2);
            assert_eq!(*stop, StopReason::Quiescent);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(tracer.current_fire(), 2);
}

#[test]
fn records_are_grouped_by_pass() {
    let tracer = traced(TracerConfig::new().enabled(), 1);
    let tracer = tracer.lock().unwrap();
    let buffer = tracer.buffer();

    assert_eq!(buffer.passes(), vec![(1, 1), (1, 2)]);
    let first: Vec<_> = buffer
        .records_for_pass(1, 1)
        .iter()
        .map(|r| r.event_type())
        .collect();
    assert_eq!(
        first,
        vec![
            "phase",
            "phase",
            "fact-inserted",
            "agenda",
            "phase",
            "rule-activated",
            "fact-retracted",
            "phase",
        ]
    );
    let phases: Vec<SessionPhase> = buffer
        .records_for_pass(1, 2)
        .iter()
        .filter_map(|r| match r.event {
            TraceEvent::Phase { phase } => Some(phase),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            SessionPhase::Deleting,
            SessionPhase::Propagating,
            SessionPhase::Firing,
            SessionPhase::Committing,
            SessionPhase::Idle,
        ]
    );
}

#[test]
fn fact_events_carry_type_names() {
    let tracer = traced(TracerConfig::new().enabled(), 0);
    let tracer = tracer.lock().unwrap();
    let inserted = tracer.buffer().by_event_type("fact-inserted");

    assert_eq!(inserted.len(), 1);
    let line = HumanFormatter::new().format(inserted[0]);
    assert!(line.contains("INSERT Counter"));

    let json = JsonFormatter::new().format(inserted[0]);
    assert!(json.contains("\"fact_type\":\"Counter\""));
}

#[test]
fn disabled_tracer_records_nothing() {
    let tracer = traced(TracerConfig::new(), 3);
    let tracer = tracer.lock().unwrap();
    assert!(tracer.buffer().is_empty());
    // Fire numbering still advances.
    assert_eq!(tracer.current_fire(), 2);
}

#[test]
fn filtered_tracer_keeps_selected_events() {
    let config = TracerConfig::new()
        .enabled()
        .filter_events(vec!["rule-activated".to_string()]);
    let tracer = traced(config, 3);
    let tracer = tracer.lock().unwrap();

    assert_eq!(tracer.buffer().len(), 3);
    let text = tracer.format_records(&tracer.buffer().recent(3));
    assert_eq!(text.lines().count(), 3);
    assert!(text.lines().all(|l| l.contains("ACTIVATED countdown")));
}
