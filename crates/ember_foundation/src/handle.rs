//! Fact handles with version counters, and fact type identifiers.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Versioned identifier for one inserted fact.
///
/// The `id` is allocated once per insert and is unique within a session.
/// The `version` increments on every update, so a handle captured before an
/// update can be detected as stale.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FactHandle {
    /// Session-unique fact identifier.
    pub id: u64,
    /// Version counter, bumped on every update.
    pub version: u32,
}

impl FactHandle {
    /// Creates a new fact handle with the given id and version.
    #[must_use]
    pub const fn new(id: u64, version: u32) -> Self {
        Self { id, version }
    }

    /// Returns the handle for the next version of the same fact.
    #[must_use]
    pub const fn next_version(self) -> Self {
        Self {
            id: self.id,
            version: self.version.wrapping_add(1),
        }
    }

    /// Returns true if both handles identify the same fact, ignoring version.
    #[must_use]
    pub const fn same_fact(self, other: Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for FactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FactHandle({}v{})", self.id, self.version)
    }
}

impl fmt::Display for FactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fact({})", self.id)
    }
}

/// Dense identifier of a declared fact type.
///
/// Indexes into the knowledge's type table and into each session's per-type
/// memories.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TypeId(pub u32);

impl TypeId {
    /// Returns the identifier as a vector index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}
