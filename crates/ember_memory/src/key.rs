//! Join keys built from field values.

use std::fmt;
use std::sync::Arc;

use ember_foundation::Value;

/// An ordered tuple of field values used as a join key.
///
/// Equality and hash are a pure function of the component values, combined
/// in field-declaration order. The single-field variant avoids allocating a
/// one-element slice; the empty variant keys buckets with no join fields.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemoryKey {
    /// Key with no components. Every fact of a loose bucket shares it.
    Empty,
    /// Key with exactly one component.
    Single(Value),
    /// Key with two or more components.
    Multi(Arc<[Value]>),
}

impl MemoryKey {
    /// Builds a key from component values.
    #[must_use]
    pub fn from_values(values: &[Value]) -> Self {
        match values {
            [] => Self::Empty,
            [v] => Self::Single(v.clone()),
            vs => Self::Multi(vs.into()),
        }
    }

    /// Builds a key by picking `positions` out of a fact's field values.
    #[must_use]
    pub fn project(fields: &[Value], positions: &[usize]) -> Self {
        match positions {
            [] => Self::Empty,
            [p] => Self::Single(fields[*p].clone()),
            ps => Self::Multi(ps.iter().map(|p| fields[*p].clone()).collect()),
        }
    }

    /// Returns the number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Single(_) => 1,
            Self::Multi(vs) => vs.len(),
        }
    }

    /// Returns true if this key has no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns the component at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        match self {
            Self::Empty => None,
            Self::Single(v) => (index == 0).then_some(v),
            Self::Multi(vs) => vs.get(index),
        }
    }
}

impl fmt::Debug for MemoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "()"),
            Self::Single(v) => write!(f, "({v:?})"),
            Self::Multi(vs) => {
                let mut t = f.debug_tuple("");
                for v in vs.iter() {
                    t.field(v);
                }
                t.finish()
            }
        }
    }
}
