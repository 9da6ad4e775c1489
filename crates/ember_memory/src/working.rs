//! Working memory: the per-type memories of one session.

use std::sync::Arc;

use ember_foundation::{FactHandle, TypeId};
use tracing::debug;

use crate::fact::RuntimeFact;
use crate::type_memory::{TypeLayout, TypeMemory};

/// Every type memory of a session, indexed by [`TypeId`].
#[derive(Clone, Debug)]
pub struct WorkingMemory {
    types: Vec<TypeMemory>,
}

impl WorkingMemory {
    /// Creates empty memories for every layout.
    ///
    /// `layouts[i]` must describe `TypeId(i)`.
    #[must_use]
    pub fn new(layouts: &[Arc<TypeLayout>], capacity: usize) -> Self {
        Self {
            types: layouts
                .iter()
                .map(|layout| TypeMemory::new(Arc::clone(layout), capacity))
                .collect(),
        }
    }

    /// Returns the memory of one type.
    ///
    /// # Panics
    ///
    /// Panics if `type_id` was not produced by the knowledge this memory was
    /// built from.
    #[must_use]
    pub fn type_memory(&self, type_id: TypeId) -> &TypeMemory {
        &self.types[type_id.index()]
    }

    /// Iterates all type memories.
    pub fn iter(&self) -> impl Iterator<Item = &TypeMemory> {
        self.types.iter()
    }

    /// Returns the total number of live facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.iter().map(TypeMemory::len).sum()
    }

    /// Returns true if no type holds a live fact.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.iter().all(TypeMemory::is_empty)
    }

    /// Returns the fact if `handle` is its live version.
    #[must_use]
    pub fn current(&self, type_id: TypeId, handle: FactHandle) -> Option<&Arc<RuntimeFact>> {
        self.types.get(type_id.index())?.current(handle)
    }

    /// Returns true if `fact` is still the live version of its fact.
    #[must_use]
    pub fn is_live(&self, fact: &RuntimeFact) -> bool {
        self.current(fact.type_id(), fact.handle()).is_some()
    }

    /// Adds a fact to its type memory's insert deltas.
    pub fn insert(&mut self, fact: Arc<RuntimeFact>) {
        if let Some(memory) = self.types.get_mut(fact.type_id().index()) {
            memory.insert(fact);
        }
    }

    /// Retracts the live version named by `handle`.
    pub fn retract(&mut self, type_id: TypeId, handle: FactHandle) -> Option<Arc<RuntimeFact>> {
        self.types.get_mut(type_id.index())?.retract(handle)
    }

    /// Commits every type memory.
    pub fn commit(&mut self) {
        for memory in &mut self.types {
            memory.commit();
        }
    }

    /// Drops emptied keys from every index. Returns the number dropped.
    pub fn compact(&mut self) -> usize {
        let dropped = self.types.iter_mut().map(TypeMemory::compact).sum();
        debug!(dropped, "compacted fact indexes");
        dropped
    }
}
