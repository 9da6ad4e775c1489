//! Session observation hooks.

use std::fmt;
use std::sync::{Arc, Mutex};

use ember_memory::RuntimeFact;

use crate::agenda::Agenda;
use crate::rule::RuleInfo;

/// States of the fire loop.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// No pending work; `fire()` has returned or not started.
    Idle,
    /// Applying queued retractions.
    Deleting,
    /// Applying queued inserts and building the agenda.
    Propagating,
    /// Running rule actions.
    Firing,
    /// Merging this pass's inserts into the committed indexes.
    Committing,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Deleting => "deleting",
            Self::Propagating => "propagating",
            Self::Firing => "firing",
            Self::Committing => "committing",
        };
        write!(f, "{name}")
    }
}

/// A change applied to working memory.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FactChange {
    /// The fact entered its type memory.
    Inserted,
    /// The fact left its type memory.
    Retracted,
}

/// Why a `fire()` call returned.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// No actions or pending bindings remained.
    Quiescent,
    /// The fire criteria returned false.
    FireCriteria,
    /// The session was closed while firing.
    Closed,
}

/// Summary of one `fire()` call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FireReport {
    /// Passes run.
    pub passes: u64,
    /// Rule activations (entries whose actions queued a change).
    pub activations: usize,
    /// Why the loop stopped.
    pub stop: StopReason,
}

/// Receives fire-loop events. Every method defaults to doing nothing.
pub trait SessionListener: Send {
    /// The loop entered `phase` during `pass`.
    fn on_phase(&mut self, pass: u64, phase: SessionPhase) {
        let _ = (pass, phase);
    }

    /// The agenda of `pass` was built (after the activation policy saw it).
    fn on_agenda(&mut self, pass: u64, agenda: &Agenda) {
        let _ = (pass, agenda);
    }

    /// A rule activated, queueing `actions` changes.
    fn on_activation(&mut self, pass: u64, rule: &RuleInfo, actions: usize) {
        let _ = (pass, rule, actions);
    }

    /// A fact entered or left working memory.
    fn on_fact(&mut self, pass: u64, change: FactChange, fact: &RuntimeFact) {
        let _ = (pass, change, fact);
    }

    /// `fire()` finished.
    fn on_fire_end(&mut self, report: &FireReport) {
        let _ = report;
    }
}

impl<L: SessionListener> SessionListener for Arc<Mutex<L>> {
    fn on_phase(&mut self, pass: u64, phase: SessionPhase) {
        if let Ok(mut inner) = self.lock() {
            inner.on_phase(pass, phase);
        }
    }

    fn on_agenda(&mut self, pass: u64, agenda: &Agenda) {
        if let Ok(mut inner) = self.lock() {
            inner.on_agenda(pass, agenda);
        }
    }

    fn on_activation(&mut self, pass: u64, rule: &RuleInfo, actions: usize) {
        if let Ok(mut inner) = self.lock() {
            inner.on_activation(pass, rule, actions);
        }
    }

    fn on_fact(&mut self, pass: u64, change: FactChange, fact: &RuntimeFact) {
        if let Ok(mut inner) = self.lock() {
            inner.on_fact(pass, change, fact);
        }
    }

    fn on_fire_end(&mut self, report: &FireReport) {
        if let Ok(mut inner) = self.lock() {
            inner.on_fire_end(report);
        }
    }
}
