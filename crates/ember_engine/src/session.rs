//! Sessions and the fire loop.
//!
//! A [`Session`] owns the working memory, one [`RuleRuntime`] per rule and
//! the queue of pending changes. Inserts, updates and retracts only queue
//! changes; [`Session::fire`] applies them and runs rules until nothing is
//! left to do.
//!
//! Each pass of the loop:
//!
//! 1. applies queued retractions (and the retract half of updates),
//! 2. applies queued inserts to the bucket deltas and builds the agenda from
//!    the rules whose buckets changed,
//! 3. runs the agenda through the activation policy and fires it,
//! 4. commits the deltas.
//!
//! In [`FireMode::Batch`] retractions queued by an action are applied right
//! after it, and the pass ends early as soon as an action queued an insert;
//! the rest of the agenda is dropped. In [`FireMode::Continuous`] the whole
//! agenda fires against the memory as it was when the pass started, and
//! nothing it queued is applied before the next pass.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ember_foundation::{Error, ErrorContext, FactHandle, Result, SemanticLimit, Value};
use ember_memory::{RuntimeFact, WorkingMemory};
use tracing::{debug, trace};

use crate::action::ActionKind;
use crate::agenda::{ActivationPolicy, Agenda, AgendaEntry, DefaultPolicy};
use crate::config::{EngineConfig, FireMode, Properties};
use crate::knowledge::Knowledge;
use crate::listener::{FactChange, FireReport, SessionListener, SessionPhase, StopReason};
use crate::rhs::RhsContext;
use crate::runtime::{Binding, RuleRuntime};
use crate::staging::{PendingAction, Staging};

type FireCriteria = Box<dyn FnMut() -> bool + Send>;

// =============================================================================
// Liveness
// =============================================================================

struct Liveness {
    active: AtomicBool,
    knowledge: Knowledge,
}

impl Liveness {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn close(&self) -> bool {
        let closed = self
            .active
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if closed {
            self.knowledge.session_closed();
        }
        closed
    }
}

/// Closes a session from anywhere, including another thread.
///
/// A running `fire()` stops before its next pass.
#[derive(Clone)]
pub struct SessionCloser(Arc<Liveness>);

impl SessionCloser {
    /// Closes the session. Returns true for the call that closed it.
    pub fn close(&self) -> bool {
        self.0.close()
    }

    /// Returns true until the session is closed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.0.is_active()
    }
}

impl fmt::Debug for SessionCloser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionCloser").field(&self.is_active()).finish()
    }
}

// =============================================================================
// Session
// =============================================================================

/// A working memory bound to a knowledge's rules.
pub struct Session {
    knowledge: Knowledge,
    liveness: Arc<Liveness>,
    properties: Properties,
    memory: WorkingMemory,
    runtimes: Vec<RuleRuntime>,
    staging: Staging,
    policy: Box<dyn ActivationPolicy>,
    listeners: Vec<Box<dyn SessionListener>>,
    criteria: Option<FireCriteria>,
}

impl Session {
    pub(crate) fn new(knowledge: Knowledge, config: &EngineConfig) -> Self {
        let runtimes: Vec<RuleRuntime> = knowledge
            .rules()
            .iter()
            .map(|rule| RuleRuntime::new(Arc::clone(rule)))
            .collect();
        Self {
            liveness: Arc::new(Liveness {
                active: AtomicBool::new(true),
                knowledge: knowledge.clone(),
            }),
            properties: knowledge.properties().clone(),
            memory: WorkingMemory::new(knowledge.layouts(), config.index_capacity),
            runtimes,
            staging: Staging::new(),
            policy: Box::new(DefaultPolicy),
            listeners: Vec::new(),
            criteria: None,
            knowledge,
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Returns true until the session is closed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.liveness.is_active()
    }

    /// Closes the session. Returns true for the call that closed it; later
    /// calls return false and change nothing.
    pub fn close(&mut self) -> bool {
        let closed = self.liveness.close();
        if closed {
            self.staging.queue.clear();
            debug!("session closed");
        }
        closed
    }

    /// Returns a handle that can close this session from another thread.
    #[must_use]
    pub fn closer(&self) -> SessionCloser {
        SessionCloser(Arc::clone(&self.liveness))
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::session_inactive())
        }
    }

    // -------------------------------------------------------------------------
    // Setup
    // -------------------------------------------------------------------------

    /// Returns the knowledge this session was created from.
    #[must_use]
    pub fn knowledge(&self) -> &Knowledge {
        &self.knowledge
    }

    /// Returns the session properties.
    #[must_use]
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Sets a property. Takes effect at the next `fire()`.
    pub fn set_property(&mut self, key: &str, value: &str) -> Option<String> {
        self.properties.set(key, value)
    }

    /// Replaces the activation policy.
    pub fn set_policy(&mut self, policy: impl ActivationPolicy + 'static) {
        self.policy = Box::new(policy);
    }

    /// Adds a listener.
    pub fn add_listener(&mut self, listener: impl SessionListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Sets the predicate checked before every pass; `fire()` stops when it
    /// returns false.
    pub fn set_fire_criteria<F>(&mut self, criteria: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.criteria = Some(Box::new(criteria));
    }

    // -------------------------------------------------------------------------
    // Facts
    // -------------------------------------------------------------------------

    /// Queues a new fact. It reaches working memory at the next `fire()`.
    ///
    /// # Errors
    ///
    /// Returns `SessionInactive` after close, `UnknownFactType` for an
    /// undeclared type, and `TypeMismatch` if a field reads a badly typed
    /// value.
    pub fn insert(&mut self, fact_type: &str, value: impl Into<Value>) -> Result<FactHandle> {
        self.ensure_active()?;
        let type_id = self.knowledge.type_id(fact_type)?;
        self.staging
            .insert(self.knowledge.layout(type_id), value.into())
    }

    /// Queues a new version of a fact and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns `SessionInactive` after close, `UnknownFact` if the fact was
    /// never inserted or has been retracted, and `StaleFact` if `handle` is
    /// not the latest version.
    pub fn update(&mut self, handle: FactHandle, value: impl Into<Value>) -> Result<FactHandle> {
        self.ensure_active()?;
        self.staging
            .update(self.knowledge.layouts(), handle, value.into())
    }

    /// Queues retraction of a fact.
    ///
    /// # Errors
    ///
    /// Same as [`Session::update`].
    pub fn retract(&mut self, handle: FactHandle) -> Result<()> {
        self.ensure_active()?;
        self.staging.retract(handle)
    }

    /// Returns the latest value of a fact, including queued updates.
    ///
    /// # Errors
    ///
    /// Same as [`Session::update`].
    pub fn get(&self, handle: FactHandle) -> Result<&Value> {
        self.ensure_active()?;
        Ok(self.staging.current(handle)?.value())
    }

    /// Returns the facts of a type held in working memory, by handle id.
    ///
    /// Queued changes are not visible until the next `fire()`.
    ///
    /// # Errors
    ///
    /// Returns `SessionInactive` after close and `UnknownFactType` for an
    /// undeclared type.
    pub fn facts(&self, fact_type: &str) -> Result<Vec<Arc<RuntimeFact>>> {
        self.ensure_active()?;
        let type_id = self.knowledge.type_id(fact_type)?;
        Ok(self.memory.type_memory(type_id).facts().cloned().collect())
    }

    /// Returns the working memory.
    #[must_use]
    pub fn memory(&self) -> &WorkingMemory {
        &self.memory
    }

    /// Returns the runtime of a rule.
    #[must_use]
    pub fn runtime(&self, rule: &str) -> Option<&RuleRuntime> {
        self.runtimes.iter().find(|r| r.rule().name() == rule)
    }

    /// Returns every committed binding of a rule.
    ///
    /// # Errors
    ///
    /// Returns `SessionInactive` after close and `UnresolvedReference` for an
    /// unknown rule.
    pub fn matches(&self, rule: &str) -> Result<Vec<Binding>> {
        self.ensure_active()?;
        self.runtime(rule)
            .map(|r| r.matches(&self.memory))
            .ok_or_else(|| Error::unresolved(rule))
    }

    /// Drops empty index keys and join rows that can no longer match.
    /// Returns the number of entries dropped.
    ///
    /// # Errors
    ///
    /// Returns `SessionInactive` after close.
    pub fn compact(&mut self) -> Result<usize> {
        self.ensure_active()?;
        let rows: usize = self
            .runtimes
            .iter_mut()
            .map(|r| r.compact(&self.memory))
            .sum();
        Ok(rows + self.memory.compact())
    }

    // -------------------------------------------------------------------------
    // Fire Loop
    // -------------------------------------------------------------------------

    /// Applies queued changes and fires rules until no work remains, the
    /// fire criteria returns false, or the session is closed.
    ///
    /// # Errors
    ///
    /// Returns `SessionInactive` after close, a `Config` error if the
    /// session properties are invalid, `LimitExceeded` when the activation
    /// limit is passed, and any error returned by a rule action (with the
    /// rule named in its context). An error ends the current pass after
    /// committing what was already applied.
    pub fn fire(&mut self) -> Result<FireReport> {
        self.ensure_active()?;
        let config = EngineConfig::from_properties(&self.properties)?;
        debug!(mode = %config.mode, "fire");

        let mut pass = 0;
        let mut activations = 0;
        let stop = loop {
            if !self.is_active() {
                break StopReason::Closed;
            }
            if !self.has_work() {
                break StopReason::Quiescent;
            }
            if let Some(criteria) = self.criteria.as_mut() {
                if !criteria() {
                    break StopReason::FireCriteria;
                }
            }
            pass += 1;
            self.run_pass(pass, &config, &mut activations)?;
        };

        let report = FireReport {
            passes: pass,
            activations,
            stop,
        };
        for listener in &mut self.listeners {
            listener.on_phase(pass, SessionPhase::Idle);
            listener.on_fire_end(&report);
        }
        debug!(passes = pass, activations, stop = ?stop, "fire finished");
        Ok(report)
    }

    fn has_work(&self) -> bool {
        self.staging.has_pending()
    }

    fn run_pass(&mut self, pass: u64, config: &EngineConfig, activations: &mut usize) -> Result<()> {
        self.enter(pass, SessionPhase::Deleting);
        self.apply_deletions(pass);

        self.enter(pass, SessionPhase::Propagating);
        self.apply_inserts(pass);
        let mut agenda = self.build_agenda();
        self.policy.on_agenda(pass, &mut agenda);
        for listener in &mut self.listeners {
            listener.on_agenda(pass, &agenda);
        }
        debug!(
            pass,
            rules = agenda.len(),
            bindings = agenda.binding_count(),
            "agenda built"
        );

        self.enter(pass, SessionPhase::Firing);
        let fired = self.fire_agenda(pass, agenda, config, activations);

        self.enter(pass, SessionPhase::Committing);
        self.memory.commit();
        fired
    }

    fn fire_agenda(
        &mut self,
        pass: u64,
        agenda: Agenda,
        config: &EngineConfig,
        activations: &mut usize,
    ) -> Result<()> {
        let mut entries = agenda.into_iter();
        while let Some(entry) = entries.next() {
            if !self.policy.test(&entry) {
                trace!(rule = %entry.rule().name, "entry vetoed by policy");
                continue;
            }
            let queued = self.execute(&entry, config.mode)?;
            if queued > 0 {
                *activations += 1;
                if *activations > config.max_activations {
                    return Err(Error::limit_exceeded(SemanticLimit::MaxActivations {
                        limit: config.max_activations,
                        context: Some(format!("rule {}", entry.rule().name)),
                    }));
                }
                trace!(rule = %entry.rule().name, queued, "rule activated");
                self.policy.on_activation(&entry, queued);
                for listener in &mut self.listeners {
                    listener.on_activation(pass, entry.rule(), queued);
                }
            }
            if config.mode == FireMode::Batch {
                self.apply_deletions(pass);
                if self.staging.queue.has(ActionKind::Insert) {
                    trace!(pass, dropped = entries.len(), "pass ended by queued insert");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Runs a rule's action for each binding of an entry and returns the
    /// number of changes queued.
    ///
    /// In batch mode a binding is skipped once one of its facts has been
    /// retracted or replaced earlier in the pass.
    fn execute(&mut self, entry: &AgendaEntry, mode: FireMode) -> Result<usize> {
        let rule = Arc::clone(self.runtimes[entry.runtime()].rule());
        let Some(rhs) = rule.rhs() else {
            return Ok(0);
        };
        let mut queued = 0;
        for binding in entry.bindings() {
            if mode == FireMode::Batch
                && !binding.facts().iter().all(|f| self.staging.is_current(f))
            {
                trace!(rule = rule.name(), ?binding, "binding outdated");
                continue;
            }
            let mut ctx = RhsContext::new(&rule, binding, &self.knowledge, &mut self.staging);
            rhs(&mut ctx).map_err(|e| in_rule(e, rule.name()))?;
            queued += ctx.queued();
        }
        Ok(queued)
    }

    fn apply_deletions(&mut self, pass: u64) {
        for action in self.staging.queue.drain(ActionKind::Retract) {
            if let Some(fact) = self.memory.retract(action.type_id, action.handle) {
                notify_fact(&mut self.listeners, pass, FactChange::Retracted, &fact);
            }
        }
        let updates: Vec<PendingAction> = self.staging.queue.drain(ActionKind::Update).collect();
        for action in updates {
            if let Some(fact) = self.memory.retract(action.type_id, action.handle) {
                notify_fact(&mut self.listeners, pass, FactChange::Retracted, &fact);
            }
            self.staging.queue.add(ActionKind::Insert, action);
        }
    }

    fn apply_inserts(&mut self, pass: u64) {
        let inserts: Vec<PendingAction> = self.staging.queue.drain(ActionKind::Insert).collect();
        for action in inserts {
            let Some(fact) = action.fact else { continue };
            // Retracted or replaced again before it reached memory.
            if !self.staging.is_current(&fact) {
                continue;
            }
            notify_fact(&mut self.listeners, pass, FactChange::Inserted, &fact);
            self.memory.insert(fact);
        }
    }

    fn build_agenda(&mut self) -> Agenda {
        let mut agenda = Agenda::new();
        for (index, runtime) in self.runtimes.iter_mut().enumerate() {
            if !runtime.has_insert_delta(&self.memory) {
                continue;
            }
            let bindings = runtime.propagate(&self.memory);
            if !bindings.is_empty() && runtime.rule().rhs().is_some() {
                agenda.push(AgendaEntry::new(runtime.info().clone(), index, bindings));
            }
        }
        agenda
    }

    fn enter(&mut self, pass: u64, phase: SessionPhase) {
        trace!(pass, %phase, "phase");
        for listener in &mut self.listeners {
            listener.on_phase(pass, phase);
        }
    }
}

fn notify_fact(
    listeners: &mut [Box<dyn SessionListener>],
    pass: u64,
    change: FactChange,
    fact: &RuntimeFact,
) {
    for listener in listeners {
        listener.on_fact(pass, change, fact);
    }
}

/// Names the failing rule in an action error.
fn in_rule(mut error: Error, rule: &str) -> Error {
    let context = match error.context.take() {
        Some(context) => context.with_frame(format!("rule {rule}")),
        None => ErrorContext::new().with_source(rule),
    };
    error.with_context(context)
}

impl Drop for Session {
    fn drop(&mut self) {
        self.liveness.close();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("active", &self.is_active())
            .field("facts", &self.memory.len())
            .field("rules", &self.runtimes.len())
            .field("pending", &self.staging.queue.len())
            .finish_non_exhaustive()
    }
}
