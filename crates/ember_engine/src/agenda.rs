//! Agenda and activation policy.
//!
//! The agenda of a pass lists, in rule order (salience descending, then
//! declaration order), every rule with bindings that have not fired yet. An
//! [`ActivationPolicy`] sees the agenda before firing, may reorder or drop
//! entries, decides per entry whether it fires, and is told about every
//! actual activation.

use std::cmp::Ordering;

use crate::rule::RuleInfo;
use crate::runtime::Binding;

/// A rule with pending bindings.
#[derive(Clone, Debug)]
pub struct AgendaEntry {
    rule: RuleInfo,
    runtime: usize,
    bindings: Vec<Binding>,
}

impl AgendaEntry {
    /// Creates an entry for the runtime at index `runtime`.
    #[must_use]
    pub fn new(rule: RuleInfo, runtime: usize, bindings: Vec<Binding>) -> Self {
        Self {
            rule,
            runtime,
            bindings,
        }
    }

    /// Returns the rule.
    #[must_use]
    pub fn rule(&self) -> &RuleInfo {
        &self.rule
    }

    /// Returns the runtime index within the session.
    #[must_use]
    pub fn runtime(&self) -> usize {
        self.runtime
    }

    /// Returns the pending bindings, oldest first.
    #[must_use]
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }
}

/// Ordered rule candidates of one pass.
#[derive(Clone, Debug, Default)]
pub struct Agenda {
    entries: Vec<AgendaEntry>,
}

impl Agenda {
    /// Creates an empty agenda.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn push(&mut self, entry: AgendaEntry) {
        self.entries.push(entry);
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no rule is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in firing order.
    pub fn iter(&self) -> impl Iterator<Item = &AgendaEntry> {
        self.entries.iter()
    }

    /// Keeps only entries for which `keep` returns true.
    pub fn retain<F: FnMut(&AgendaEntry) -> bool>(&mut self, keep: F) {
        self.entries.retain(keep);
    }

    /// Reorders entries. The sort is stable.
    pub fn sort_by<F: FnMut(&AgendaEntry, &AgendaEntry) -> Ordering>(&mut self, compare: F) {
        self.entries.sort_by(compare);
    }

    /// Returns the total number of pending bindings.
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.entries.iter().map(|e| e.bindings.len()).sum()
    }
}

impl IntoIterator for Agenda {
    type Item = AgendaEntry;
    type IntoIter = std::vec::IntoIter<AgendaEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Decides which agenda entries fire and observes activations.
pub trait ActivationPolicy: Send {
    /// Called once per pass with the fresh agenda.
    fn on_agenda(&mut self, pass: u64, agenda: &mut Agenda) {
        let _ = (pass, agenda);
    }

    /// Returns false to skip an entry. Skipped bindings are dropped.
    fn test(&mut self, entry: &AgendaEntry) -> bool {
        let _ = entry;
        true
    }

    /// Called after an entry's actions queued at least one change.
    fn on_activation(&mut self, entry: &AgendaEntry, actions: usize) {
        let _ = (entry, actions);
    }
}

/// Fires every entry in agenda order.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultPolicy;

impl ActivationPolicy for DefaultPolicy {}
