//! Runtime fact snapshots.

use std::fmt;

use ember_foundation::{AlphaMask, FactHandle, TypeId, Value};

/// An immutable snapshot of one fact version.
///
/// Carries the user payload, the values of the type's active fields (read
/// once, when the fact was enqueued), and the alpha test results over those
/// values. Updating a fact produces a new `RuntimeFact` with a bumped handle
/// version; the old snapshot is never mutated.
#[derive(Clone)]
pub struct RuntimeFact {
    handle: FactHandle,
    type_id: TypeId,
    value: Value,
    fields: Box<[Value]>,
    alpha: AlphaMask,
}

impl RuntimeFact {
    /// Creates a fact snapshot from already extracted parts.
    #[must_use]
    pub fn new(
        handle: FactHandle,
        type_id: TypeId,
        value: Value,
        fields: Box<[Value]>,
        alpha: AlphaMask,
    ) -> Self {
        Self {
            handle,
            type_id,
            value,
            fields,
            alpha,
        }
    }

    /// Returns the handle of this version.
    #[must_use]
    pub fn handle(&self) -> FactHandle {
        self.handle
    }

    /// Returns the fact type.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the user payload.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns the active field values, in active-field order.
    #[must_use]
    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    /// Returns the active field value at `position`.
    #[must_use]
    pub fn field(&self, position: usize) -> Option<&Value> {
        self.fields.get(position)
    }

    /// Returns the alpha test results.
    #[must_use]
    pub fn alpha(&self) -> AlphaMask {
        self.alpha
    }

    /// Returns true if both snapshots carry equal active field values.
    ///
    /// Used to report updates that changed nothing the rules can observe.
    #[must_use]
    pub fn same_values(&self, other: &RuntimeFact) -> bool {
        self.type_id == other.type_id && self.fields == other.fields
    }
}

impl fmt::Debug for RuntimeFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeFact")
            .field("handle", &self.handle)
            .field("type", &self.type_id)
            .field("fields", &self.fields)
            .field("alpha", &self.alpha)
            .finish_non_exhaustive()
    }
}
