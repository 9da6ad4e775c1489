//! Trace event and record types.
//!
//! This module defines the events recorded while a session fires.

use std::sync::Arc;

use ember_engine::{SessionPhase, StopReason};
use ember_foundation::{FactHandle, Value};

// =============================================================================
// Trace Event
// =============================================================================

/// Events that can be traced while a session fires.
#[derive(Clone, Debug)]
pub enum TraceEvent {
    /// The fire loop entered a phase.
    Phase {
        /// The phase entered.
        phase: SessionPhase,
    },

    /// The agenda of a pass was built.
    Agenda {
        /// Rule names with their pending binding counts, in firing order.
        entries: Vec<(Arc<str>, usize)>,
    },

    /// A rule activated.
    RuleActivated {
        /// The rule that activated.
        rule: Arc<str>,
        /// Its salience.
        salience: i32,
        /// Number of changes its action queued.
        actions: usize,
    },

    /// A fact entered working memory.
    FactInserted {
        /// The fact version inserted.
        handle: FactHandle,
        /// Fact type name.
        fact_type: Arc<str>,
        /// The fact payload.
        value: Value,
    },

    /// A fact left working memory.
    FactRetracted {
        /// The fact version retracted.
        handle: FactHandle,
        /// Fact type name.
        fact_type: Arc<str>,
    },

    /// A `fire()` call returned.
    FireEnd {
        /// Passes run.
        passes: u64,
        /// Rule activations.
        activations: usize,
        /// Why the loop stopped.
        stop: StopReason,
    },
}

impl TraceEvent {
    /// Returns a short name for the event type.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Phase { .. } => "phase",
            Self::Agenda { .. } => "agenda",
            Self::RuleActivated { .. } => "rule-activated",
            Self::FactInserted { .. } => "fact-inserted",
            Self::FactRetracted { .. } => "fact-retracted",
            Self::FireEnd { .. } => "fire-end",
        }
    }

    /// Returns true if this is a rule-related event.
    #[must_use]
    pub fn is_rule_event(&self) -> bool {
        matches!(self, Self::Agenda { .. } | Self::RuleActivated { .. })
    }

    /// Returns true if this event changed working memory.
    #[must_use]
    pub fn is_fact_event(&self) -> bool {
        matches!(self, Self::FactInserted { .. } | Self::FactRetracted { .. })
    }
}

// =============================================================================
// Trace Record
// =============================================================================

/// A timestamped trace record.
#[derive(Clone, Debug)]
pub struct TraceRecord {
    /// Unique record ID within the tracer.
    pub id: u64,
    /// Number of the `fire()` call, starting at 1.
    pub fire: u64,
    /// Pass within that call (0 before the first pass).
    pub pass: u64,
    /// Timestamp in nanoseconds since the tracer was created.
    pub timestamp_ns: u64,
    /// The trace event.
    pub event: TraceEvent,
}

impl TraceRecord {
    /// Creates a new trace record.
    #[must_use]
    pub fn new(id: u64, fire: u64, pass: u64, timestamp_ns: u64, event: TraceEvent) -> Self {
        Self {
            id,
            fire,
            pass,
            timestamp_ns,
            event,
        }
    }

    /// Returns the event type name.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }
}
