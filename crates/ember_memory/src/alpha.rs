//! Alpha stage: single-fact tests evaluated once per fact version.

use ember_foundation::{AlphaMask, Error, Result, SemanticLimit, Value};

use crate::evaluator::Evaluator;

/// A compiled single-fact condition.
#[derive(Clone, Debug)]
pub struct AlphaEvaluator {
    /// Predicate over the referenced fields.
    pub evaluator: Evaluator,
    /// Positions of the referenced fields within the fact's active fields.
    pub fields: Vec<usize>,
}

impl AlphaEvaluator {
    /// Creates an alpha evaluator.
    #[must_use]
    pub fn new(evaluator: Evaluator, fields: Vec<usize>) -> Self {
        Self { evaluator, fields }
    }

    /// Tests a fact's active field values.
    #[must_use]
    pub fn test(&self, values: &[Value]) -> bool {
        let args: Vec<Value> = self.fields.iter().map(|&i| values[i].clone()).collect();
        self.evaluator.test(&args)
    }
}

/// The ordered alpha evaluators of one fact type.
///
/// Evaluator `i` owns bit `i` of every [`AlphaMask`] produced for the type.
#[derive(Clone, Debug, Default)]
pub struct AlphaStage {
    evaluators: Vec<AlphaEvaluator>,
}

impl AlphaStage {
    /// Creates an empty stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an evaluator and returns its bit index.
    ///
    /// # Errors
    ///
    /// Returns `LimitExceeded` once the type already has
    /// [`AlphaMask::CAPACITY`] evaluators.
    pub fn add(&mut self, fact_type: &str, evaluator: AlphaEvaluator) -> Result<usize> {
        if self.evaluators.len() >= AlphaMask::CAPACITY {
            return Err(Error::limit_exceeded(SemanticLimit::MaxAlphaConditions {
                limit: AlphaMask::CAPACITY,
                fact_type: fact_type.to_string(),
            }));
        }
        self.evaluators.push(evaluator);
        Ok(self.evaluators.len() - 1)
    }

    /// Returns the number of evaluators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    /// Returns true if the type has no alpha evaluators.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }

    /// Runs every evaluator against a fact's active field values.
    #[must_use]
    pub fn evaluate(&self, values: &[Value]) -> AlphaMask {
        self.evaluators
            .iter()
            .enumerate()
            .filter(|(_, e)| e.test(values))
            .fold(AlphaMask::EMPTY, |mask, (i, _)| mask.with(i))
    }
}
