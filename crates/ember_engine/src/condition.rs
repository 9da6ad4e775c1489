//! Conditions and field references.

use std::fmt;
use std::str::FromStr;

use ember_foundation::{Error, Result, Value};
use ember_memory::Evaluator;

/// A `$var.field` reference, resolved at rule-build time.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// Fact variable name, including its sigil (e.g. `$p`).
    pub var: String,
    /// Field name on the variable's fact type.
    pub field: String,
}

impl FieldRef {
    /// Parses `"$p.age"` into its variable and field parts.
    ///
    /// # Errors
    ///
    /// Returns an unresolved reference error if there is no `.` or either
    /// side of it is empty.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().split_once('.') {
            Some((var, field)) if !var.is_empty() && !field.is_empty() => Ok(Self {
                var: var.to_string(),
                field: field.to_string(),
            }),
            _ => Err(Error::unresolved(s)),
        }
    }
}

impl FromStr for FieldRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.var, self.field)
    }
}

/// An evaluator plus the field references that feed it, in argument order.
#[derive(Clone, Debug)]
pub struct Condition {
    /// The predicate.
    pub evaluator: Evaluator,
    /// Unparsed field references, one per evaluator argument.
    pub refs: Vec<String>,
}

impl Condition {
    /// Creates a condition from an evaluator and its field references.
    pub fn new<I, S>(evaluator: Evaluator, refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            evaluator,
            refs: refs.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a condition whose arity is the number of references.
    pub fn from_fn<I, S, F>(refs: I, test: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&[Value]) -> bool + Send + Sync + 'static,
    {
        let refs: Vec<String> = refs.into_iter().map(Into::into).collect();
        Self {
            evaluator: Evaluator::new(refs.len(), test),
            refs,
        }
    }

    /// Equality between two field references.
    #[must_use]
    pub fn equal(left: &str, right: &str) -> Self {
        Self::new(Evaluator::equality(2), [left, right])
    }
}
