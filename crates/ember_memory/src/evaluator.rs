//! Compiled condition evaluators.

use std::fmt;
use std::sync::Arc;

use ember_foundation::Value;

/// A pure boolean predicate over a fixed-arity vector of field values.
///
/// The engine never inspects how an evaluator was produced. It hands the
/// evaluator exactly `arity` values, in the order of the field references the
/// condition was declared with.
#[derive(Clone)]
pub struct Evaluator {
    arity: usize,
    equality: bool,
    test: Arc<dyn Fn(&[Value]) -> bool + Send + Sync>,
}

impl Evaluator {
    /// Creates an evaluator of the given arity.
    pub fn new<F>(arity: usize, test: F) -> Self
    where
        F: Fn(&[Value]) -> bool + Send + Sync + 'static,
    {
        Self {
            arity,
            equality: false,
            test: Arc::new(test),
        }
    }

    /// Evaluator that holds when all arguments are equal.
    ///
    /// Joins use it to look keys up instead of scanning them.
    #[must_use]
    pub fn equality(arity: usize) -> Self {
        Self {
            equality: true,
            ..Self::new(arity, |values| values.windows(2).all(|w| w[0] == w[1]))
        }
    }

    /// Returns true for evaluators built by [`Evaluator::equality`].
    #[must_use]
    pub fn is_equality(&self) -> bool {
        self.equality
    }

    /// Returns the number of values this evaluator expects.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Evaluates the predicate.
    #[must_use]
    pub fn test(&self, values: &[Value]) -> bool {
        debug_assert_eq!(values.len(), self.arity);
        (self.test)(values)
    }
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Evaluator(arity={})", self.arity)
    }
}
