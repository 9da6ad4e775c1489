//! Action queue: pending memory changes grouped by operation kind.

use std::fmt;

/// Kind of a pending memory change.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Add a new fact.
    Insert,
    /// Replace a fact with a new version.
    Update,
    /// Remove a fact.
    Retract,
}

impl ActionKind {
    /// Every kind, in queue order.
    pub const ALL: [ActionKind; 3] = [Self::Insert, Self::Update, Self::Retract];

    const fn slot(self) -> usize {
        match self {
            Self::Insert => 0,
            Self::Update => 1,
            Self::Retract => 2,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Retract => write!(f, "RETRACT"),
        }
    }
}

/// One ordered queue per [`ActionKind`].
///
/// Order within a kind is insertion order. Draining keeps each queue's
/// allocation for reuse in the next cycle.
#[derive(Clone, Debug)]
pub struct ActionQueue<T> {
    queues: [Vec<T>; 3],
}

impl<T> Default for ActionQueue<T> {
    fn default() -> Self {
        Self {
            queues: [Vec::new(), Vec::new(), Vec::new()],
        }
    }
}

impl<T> ActionQueue<T> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an action of `kind`.
    pub fn add(&mut self, kind: ActionKind, action: T) {
        self.queues[kind.slot()].push(action);
    }

    /// Returns the pending actions of `kind`.
    #[must_use]
    pub fn get(&self, kind: ActionKind) -> &[T] {
        &self.queues[kind.slot()]
    }

    /// Removes and yields the pending actions of `kind`, in order.
    pub fn drain(&mut self, kind: ActionKind) -> std::vec::Drain<'_, T> {
        self.queues[kind.slot()].drain(..)
    }

    /// Returns true if at least one action of `kind` is pending.
    #[must_use]
    pub fn has(&self, kind: ActionKind) -> bool {
        !self.queues[kind.slot()].is_empty()
    }

    /// Returns the total number of pending actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queues.iter().map(Vec::len).sum()
    }

    /// Returns true if no action is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(Vec::is_empty)
    }

    /// Removes every pending action.
    pub fn clear(&mut self) {
        for queue in &mut self.queues {
            queue.clear();
        }
    }
}
