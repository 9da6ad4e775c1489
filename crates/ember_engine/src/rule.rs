//! Rule descriptors and compiled rules.
//!
//! A [`RuleDescriptor`] is the declarative form produced by a
//! [`RuleBuilder`]: fact variables, conditions, salience, properties and the
//! action. The [`compiler`] resolves it against the declared fact types into
//! a [`CompiledRule`] that sessions share read-only.

pub mod compiler;

pub use compiler::RuleCompiler;

use std::fmt;
use std::sync::Arc;

use ember_foundation::{Result, TypeId, Value};
use ember_memory::{BucketId, Evaluator};

use crate::beta::JoinPlan;
use crate::condition::Condition;
use crate::config::Properties;
use crate::rhs::RhsContext;

/// A rule action.
pub type RhsFn = Arc<dyn Fn(&mut RhsContext<'_>) -> Result<()> + Send + Sync>;

// =============================================================================
// Rule Descriptor
// =============================================================================

/// A declared fact variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FactDecl {
    /// Variable name (e.g. `$p`).
    pub var: String,
    /// Fact type name.
    pub fact_type: String,
}

/// Declarative rule definition.
#[derive(Clone)]
pub struct RuleDescriptor {
    /// Rule name, unique within a knowledge.
    pub name: String,
    /// Priority (higher fires first).
    pub salience: i32,
    /// Arbitrary properties.
    pub properties: Properties,
    /// Fact variables, in declaration order.
    pub facts: Vec<FactDecl>,
    /// Conditions, in declaration order.
    pub conditions: Vec<Condition>,
    /// The action; `None` never activates.
    pub rhs: Option<RhsFn>,
}

impl fmt::Debug for RuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleDescriptor")
            .field("name", &self.name)
            .field("salience", &self.salience)
            .field("facts", &self.facts)
            .field("conditions", &self.conditions.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`RuleDescriptor`].
pub struct RuleBuilder {
    descriptor: RuleDescriptor,
}

impl RuleBuilder {
    /// Starts a rule with the given name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            descriptor: RuleDescriptor {
                name: name.to_string(),
                salience: 0,
                properties: Properties::new(),
                facts: Vec::new(),
                conditions: Vec::new(),
                rhs: None,
            },
        }
    }

    /// Declares a fact variable of the given type.
    #[must_use]
    pub fn fact(mut self, var: &str, fact_type: &str) -> Self {
        self.descriptor.facts.push(FactDecl {
            var: var.to_string(),
            fact_type: fact_type.to_string(),
        });
        self
    }

    /// Adds a condition over the referenced fields.
    #[must_use]
    pub fn condition(mut self, condition: Condition) -> Self {
        self.descriptor.conditions.push(condition);
        self
    }

    /// Adds a condition from an evaluator and its field references.
    #[must_use]
    pub fn evaluator<I, S>(self, evaluator: Evaluator, refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.condition(Condition::new(evaluator, refs))
    }

    /// Adds a condition from a closure over the referenced field values.
    #[must_use]
    pub fn when<I, S, F>(self, refs: I, test: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&[Value]) -> bool + Send + Sync + 'static,
    {
        self.condition(Condition::from_fn(refs, test))
    }

    /// Adds an equality join between two fields.
    #[must_use]
    pub fn join(self, left: &str, right: &str) -> Self {
        self.condition(Condition::equal(left, right))
    }

    /// Sets the salience.
    #[must_use]
    pub fn salience(mut self, salience: i32) -> Self {
        self.descriptor.salience = salience;
        self
    }

    /// Sets a rule property.
    #[must_use]
    pub fn property(mut self, key: &str, value: &str) -> Self {
        self.descriptor.properties.set(key, value);
        self
    }

    /// Sets the action and finishes the rule.
    pub fn execute<F>(mut self, rhs: F) -> RuleDescriptor
    where
        F: Fn(&mut RhsContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.descriptor.rhs = Some(Arc::new(rhs));
        self.descriptor
    }

    /// Finishes the rule without an action.
    #[must_use]
    pub fn build(self) -> RuleDescriptor {
        self.descriptor
    }
}

// =============================================================================
// Compiled Rule
// =============================================================================

/// Identity and ordering data of a compiled rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleInfo {
    /// Rule name.
    pub name: Arc<str>,
    /// Priority (higher fires first).
    pub salience: i32,
    /// Declaration order within the knowledge.
    pub order: usize,
}

/// A fact variable resolved to its type and bucket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VarBinding {
    /// Variable name.
    pub name: Arc<str>,
    /// Fact type.
    pub type_id: TypeId,
    /// Bucket the variable reads from.
    pub bucket: BucketId,
}

/// How one group of fact variables is matched.
#[derive(Clone, Debug)]
pub enum GroupPlan {
    /// A single variable joined with nothing; reads its bucket directly.
    Loose {
        /// Rule variable index.
        var: usize,
    },
    /// Variables connected by multi-variable conditions.
    Joined(Arc<JoinPlan>),
}

impl GroupPlan {
    /// Returns the rule variable indexes covered by this group.
    #[must_use]
    pub fn vars(&self) -> &[usize] {
        match self {
            Self::Loose { var } => std::slice::from_ref(var),
            Self::Joined(plan) => plan.vars(),
        }
    }
}

/// A rule resolved against the knowledge's fact types.
#[derive(Clone)]
pub struct CompiledRule {
    info: RuleInfo,
    properties: Properties,
    vars: Vec<VarBinding>,
    groups: Vec<GroupPlan>,
    rhs: Option<RhsFn>,
}

impl CompiledRule {
    /// Returns name, salience and declaration order.
    #[must_use]
    pub fn info(&self) -> &RuleInfo {
        &self.info
    }

    /// Returns the rule name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Returns the salience.
    #[must_use]
    pub fn salience(&self) -> i32 {
        self.info.salience
    }

    /// Returns the rule properties.
    #[must_use]
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Returns the fact variables, in declaration order.
    #[must_use]
    pub fn vars(&self) -> &[VarBinding] {
        &self.vars
    }

    /// Returns the index of a fact variable by name.
    #[must_use]
    pub fn var_index(&self, name: &str) -> Option<usize> {
        self.vars.iter().position(|v| &*v.name == name)
    }

    /// Returns the fact groups.
    #[must_use]
    pub fn groups(&self) -> &[GroupPlan] {
        &self.groups
    }

    /// Returns the action.
    #[must_use]
    pub fn rhs(&self) -> Option<&RhsFn> {
        self.rhs.as_ref()
    }
}

impl fmt::Debug for CompiledRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRule")
            .field("info", &self.info)
            .field("vars", &self.vars)
            .field("groups", &self.groups)
            .finish_non_exhaustive()
    }
}
