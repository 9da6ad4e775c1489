//! Fact registry and pending action queue of a session.
//!
//! Every insert, update and retract, whether issued by the session owner or
//! by a rule action, is validated here against the latest enqueued version
//! of each fact and then queued. Working memory only changes when the fire
//! loop drains the queue.

use std::collections::HashMap;
use std::sync::Arc;

use ember_foundation::{Error, FactHandle, Result, TypeId, Value};
use ember_memory::{RuntimeFact, TypeLayout};
use tracing::trace;

use crate::action::{ActionKind, ActionQueue};

/// A queued memory change.
#[derive(Clone, Debug)]
pub(crate) struct PendingAction {
    /// Fact being inserted, or version being replaced or retracted.
    pub handle: FactHandle,
    pub type_id: TypeId,
    /// New version for inserts and updates.
    pub fact: Option<Arc<RuntimeFact>>,
}

#[derive(Debug, Default)]
pub(crate) struct Staging {
    next_id: u64,
    latest: HashMap<u64, Arc<RuntimeFact>>,
    pub queue: ActionQueue<PendingAction>,
}

impl Staging {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, layout: &TypeLayout, value: Value) -> Result<FactHandle> {
        let handle = FactHandle::new(self.next_id, 0);
        let fact = Arc::new(layout.build_fact(handle, value)?);
        self.next_id += 1;
        self.latest.insert(handle.id, Arc::clone(&fact));
        self.queue.add(
            ActionKind::Insert,
            PendingAction {
                handle,
                type_id: layout.type_id(),
                fact: Some(fact),
            },
        );
        Ok(handle)
    }

    pub fn update(
        &mut self,
        layouts: &[Arc<TypeLayout>],
        handle: FactHandle,
        value: Value,
    ) -> Result<FactHandle> {
        let old = Arc::clone(self.current(handle)?);
        let layout = &layouts[old.type_id().index()];
        let next = handle.next_version();
        let fact = Arc::new(layout.build_fact(next, value)?);
        if old.same_values(&fact) {
            trace!(?handle, "update leaves active fields unchanged");
        }
        self.latest.insert(handle.id, Arc::clone(&fact));
        self.queue.add(
            ActionKind::Update,
            PendingAction {
                handle,
                type_id: old.type_id(),
                fact: Some(fact),
            },
        );
        Ok(next)
    }

    pub fn retract(&mut self, handle: FactHandle) -> Result<()> {
        let type_id = self.current(handle)?.type_id();
        self.latest.remove(&handle.id);
        self.queue.add(
            ActionKind::Retract,
            PendingAction {
                handle,
                type_id,
                fact: None,
            },
        );
        Ok(())
    }

    /// Returns the latest version if `handle` names it.
    pub fn current(&self, handle: FactHandle) -> Result<&Arc<RuntimeFact>> {
        let fact = self
            .latest
            .get(&handle.id)
            .ok_or_else(|| Error::unknown_fact(handle))?;
        if fact.handle() == handle {
            Ok(fact)
        } else {
            Err(Error::stale_fact(handle))
        }
    }

    /// Returns true if `fact` is the latest version of its fact.
    pub fn is_current(&self, fact: &RuntimeFact) -> bool {
        self.latest
            .get(&fact.handle().id)
            .is_some_and(|f| f.handle() == fact.handle())
    }

    /// Returns true if an insert, update or retract is queued.
    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }
}
