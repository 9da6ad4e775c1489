//! Tracing system for Ember sessions.
//!
//! A [`Tracer`] is a [`SessionListener`] that records what the fire loop does
//! into a bounded [`TraceBuffer`], with zero overhead when disabled. Records
//! can be printed as they happen or formatted later, in human-readable or
//! JSON form.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//!
//! use ember_debug::trace::{Tracer, TracerConfig};
//! use ember_engine::{Knowledge, RuleBuilder};
//! use ember_foundation::{Type, Value};
//! use ember_memory::FactTypeSchema;
//!
//! let knowledge = Knowledge::builder()
//!     .declare(FactTypeSchema::new("Ping").with_field("n", Type::Int))
//!     .rule(RuleBuilder::new("seen").fact("$p", "Ping").execute(|_| Ok(())))
//!     .build()
//!     .unwrap();
//!
//! let tracer = Arc::new(Mutex::new(
//!     Tracer::new(TracerConfig::new().enabled()).with_knowledge(&knowledge),
//! ));
//! let mut session = knowledge.new_session().unwrap();
//! session.add_listener(Arc::clone(&tracer));
//! session.insert("Ping", Value::record([("n", Value::Int(1))])).unwrap();
//! session.fire().unwrap();
//!
//! assert!(!tracer.lock().unwrap().buffer().by_event_type("fact-inserted").is_empty());
//! ```

pub mod buffer;
pub mod format;
pub mod record;

pub use buffer::{PassKey, TraceBuffer, TraceBufferStats};
pub use format::{HumanFormatter, JsonFormatter, TraceFormatter};
pub use record::{TraceEvent, TraceRecord};

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;

use ember_engine::{Agenda, FactChange, FireReport, Knowledge, RuleInfo, SessionListener, SessionPhase};
use ember_foundation::TypeId;
use ember_memory::RuntimeFact;

// =============================================================================
// Trace Output
// =============================================================================

/// Where trace output should be sent.
#[derive(Clone, Debug, Default)]
pub enum TraceOutput {
    /// No output (traces still recorded in buffer).
    #[default]
    None,
    /// Write to stderr.
    Stderr,
}

// =============================================================================
// Tracer Configuration
// =============================================================================

/// Configuration for the tracer.
#[derive(Clone, Debug)]
pub struct TracerConfig {
    /// Whether tracing is enabled.
    pub enabled: bool,
    /// Maximum records to keep in buffer.
    pub buffer_size: usize,
    /// Where to output traces.
    pub output: TraceOutput,
    /// Whether to use JSON format.
    pub json_format: bool,
    /// Filter for specific event types (empty = all).
    pub event_filter: Vec<String>,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            buffer_size: 10_000,
            output: TraceOutput::None,
            json_format: false,
            event_filter: Vec::new(),
        }
    }
}

impl TracerConfig {
    /// Creates a new tracer configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to enable tracing.
    #[must_use]
    pub fn enabled(mut self) -> Self {
        self.enabled = true;
        self
    }

    /// Builder method to set buffer size.
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Builder method to output to stderr.
    #[must_use]
    pub fn to_stderr(mut self) -> Self {
        self.output = TraceOutput::Stderr;
        self
    }

    /// Builder method to use JSON format.
    #[must_use]
    pub fn json(mut self) -> Self {
        self.json_format = true;
        self
    }

    /// Builder method to filter event types.
    #[must_use]
    pub fn filter_events(mut self, types: Vec<String>) -> Self {
        self.event_filter = types;
        self
    }
}

// =============================================================================
// Tracer
// =============================================================================

/// Records session events.
///
/// Register it with [`ember_engine::Session::add_listener`], usually wrapped
/// in `Arc<Mutex<_>>` so the buffer stays reachable.
pub struct Tracer {
    config: TracerConfig,
    buffer: TraceBuffer,
    fire: u64,
    pass: u64,
    start_time: Instant,
    type_names: Vec<Arc<str>>,
    human_formatter: HumanFormatter,
    json_formatter: JsonFormatter,
}

impl Tracer {
    /// Creates a new tracer with the given configuration.
    #[must_use]
    pub fn new(config: TracerConfig) -> Self {
        let buffer_size = config.buffer_size;
        Self {
            config,
            buffer: TraceBuffer::new(buffer_size),
            fire: 1,
            pass: 0,
            start_time: Instant::now(),
            type_names: Vec::new(),
            human_formatter: HumanFormatter::new().with_timestamps(),
            json_formatter: JsonFormatter::new(),
        }
    }

    /// Creates a tracer with default configuration (disabled).
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(TracerConfig::default())
    }

    /// Creates an enabled tracer that outputs to stderr.
    #[must_use]
    pub fn to_stderr() -> Self {
        Self::new(TracerConfig::new().enabled().to_stderr())
    }

    /// Builder method to name fact types after a knowledge's declarations.
    #[must_use]
    pub fn with_knowledge(mut self, knowledge: &Knowledge) -> Self {
        self.type_names = knowledge
            .layouts()
            .iter()
            .map(|l| Arc::from(l.name()))
            .collect();
        self
    }

    /// Returns whether tracing is enabled.
    #[must_use]
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Enables tracing.
    pub fn enable(&mut self) {
        self.config.enabled = true;
    }

    /// Disables tracing.
    pub fn disable(&mut self) {
        self.config.enabled = false;
    }

    /// Returns the number of the current (or next) `fire()` call.
    #[must_use]
    pub fn current_fire(&self) -> u64 {
        self.fire
    }

    /// Sets whether to use JSON output format.
    pub fn set_json_format(&mut self, json: bool) {
        self.config.json_format = json;
    }

    /// Sets the trace output destination.
    pub fn set_output(&mut self, output: TraceOutput) {
        self.config.output = output;
    }

    /// Records a trace event.
    #[inline]
    pub fn record(&mut self, event: TraceEvent) {
        if !self.config.enabled {
            return;
        }
        self.record_internal(event);
    }

    fn record_internal(&mut self, event: TraceEvent) {
        if !self.config.event_filter.is_empty()
            && !self
                .config
                .event_filter
                .iter()
                .any(|t| t == event.event_type())
        {
            return;
        }

        let timestamp_ns = u64::try_from(self.start_time.elapsed().as_nanos()).unwrap_or(u64::MAX);
        let id = self.buffer.push(self.fire, self.pass, timestamp_ns, event);

        if let TraceOutput::Stderr = self.config.output {
            if let Some(record) = self.buffer.get(id) {
                let line = self.format_record(record);
                let _ = writeln!(io::stderr(), "{line}");
            }
        }
    }

    /// Formats a record using the current format settings.
    #[must_use]
    pub fn format_record(&self, record: &TraceRecord) -> String {
        if self.config.json_format {
            self.json_formatter.format(record)
        } else {
            self.human_formatter.format(record)
        }
    }

    /// Formats multiple records.
    #[must_use]
    pub fn format_records(&self, records: &[&TraceRecord]) -> String {
        if self.config.json_format {
            self.json_formatter.format_many(records)
        } else {
            self.human_formatter.format_many(records)
        }
    }

    /// Returns the trace buffer.
    #[must_use]
    pub fn buffer(&self) -> &TraceBuffer {
        &self.buffer
    }

    /// Clears the trace buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Returns buffer statistics.
    #[must_use]
    pub fn stats(&self) -> TraceBufferStats {
        self.buffer.stats()
    }

    fn type_name(&self, type_id: TypeId) -> Arc<str> {
        self.type_names
            .get(type_id.index())
            .cloned()
            .unwrap_or_else(|| format!("{type_id:?}").into())
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::disabled()
    }
}

impl SessionListener for Tracer {
    fn on_phase(&mut self, pass: u64, phase: SessionPhase) {
        self.pass = pass;
        self.record(TraceEvent::Phase { phase });
    }

    fn on_agenda(&mut self, pass: u64, agenda: &Agenda) {
        if !self.is_enabled() {
            return;
        }
        self.pass = pass;
        let entries = agenda
            .iter()
            .map(|e| (Arc::clone(&e.rule().name), e.bindings().len()))
            .collect();
        self.record(TraceEvent::Agenda { entries });
    }

    fn on_activation(&mut self, pass: u64, rule: &RuleInfo, actions: usize) {
        self.pass = pass;
        self.record(TraceEvent::RuleActivated {
            rule: Arc::clone(&rule.name),
            salience: rule.salience,
            actions,
        });
    }

    fn on_fact(&mut self, pass: u64, change: FactChange, fact: &RuntimeFact) {
        if !self.is_enabled() {
            return;
        }
        self.pass = pass;
        let fact_type = self.type_name(fact.type_id());
        let event = match change {
            FactChange::Inserted => TraceEvent::FactInserted {
                handle: fact.handle(),
                fact_type,
                value: fact.value().clone(),
            },
            FactChange::Retracted => TraceEvent::FactRetracted {
                handle: fact.handle(),
                fact_type,
            },
        };
        self.record(event);
    }

    fn on_fire_end(&mut self, report: &FireReport) {
        self.pass = report.passes;
        self.record(TraceEvent::FireEnd {
            passes: report.passes,
            activations: report.activations,
            stop: report.stop,
        });
        self.fire += 1;
        self.pass = 0;
    }
}
