//! Rule action context.
//!
//! An action reads the facts bound to its rule's variables and queues
//! memory changes. Nothing it queues is visible to matching until the fire
//! loop applies the queue, so an action always sees the binding it was
//! called with.
//!
//! In continuous mode a binding may hold a fact that an earlier rule of the
//! same pass already retracted or replaced. Updating or deleting such a fact
//! through its variable queues nothing: the first change wins.

use std::sync::Arc;

use ember_foundation::{Error, FactHandle, Result, Value};
use ember_memory::RuntimeFact;
use tracing::trace;

use crate::knowledge::Knowledge;
use crate::rule::CompiledRule;
use crate::runtime::Binding;
use crate::staging::Staging;

/// What a rule action can see and do.
pub struct RhsContext<'a> {
    rule: &'a CompiledRule,
    binding: &'a Binding,
    knowledge: &'a Knowledge,
    staging: &'a mut Staging,
    /// Bound facts changed by an earlier action, by variable index.
    superseded: Vec<bool>,
    queued: usize,
}

impl<'a> RhsContext<'a> {
    pub(crate) fn new(
        rule: &'a CompiledRule,
        binding: &'a Binding,
        knowledge: &'a Knowledge,
        staging: &'a mut Staging,
    ) -> Self {
        let superseded = binding
            .facts()
            .iter()
            .map(|f| !staging.is_current(f))
            .collect();
        Self {
            rule,
            binding,
            knowledge,
            staging,
            superseded,
            queued: 0,
        }
    }

    /// Returns the name of the firing rule.
    #[must_use]
    pub fn rule_name(&self) -> &str {
        self.rule.name()
    }

    /// Returns the number of changes this action has queued so far.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queued
    }

    /// Returns the fact bound to `var`.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedReference` if the rule declares no such variable.
    pub fn fact(&self, var: &str) -> Result<&'a Arc<RuntimeFact>> {
        let binding = self.binding;
        self.rule
            .var_index(var)
            .and_then(|i| binding.get(i))
            .ok_or_else(|| Error::unresolved(var))
    }

    /// Returns the value of the fact bound to `var`.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedReference` if the rule declares no such variable.
    pub fn get(&self, var: &str) -> Result<&'a Value> {
        Ok(self.fact(var)?.value())
    }

    /// Returns the handle of the fact bound to `var`.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedReference` if the rule declares no such variable.
    pub fn handle(&self, var: &str) -> Result<FactHandle> {
        Ok(self.fact(var)?.handle())
    }

    /// Reads a declared field of the fact bound to `var`.
    ///
    /// Any declared field can be read, active or not.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedReference` for an unknown variable, `UnknownField`
    /// for an undeclared field, and `TypeMismatch` if the reader returns a
    /// value of the wrong type.
    pub fn field(&self, var: &str, field: &str) -> Result<Value> {
        let fact = self.fact(var)?;
        let schema = self.knowledge.layout(fact.type_id()).schema();
        schema
            .field(field)
            .ok_or_else(|| Error::unknown_field(schema.name.as_ref(), field))?
            .extract(fact.value())
    }

    /// Queues a new fact.
    ///
    /// # Errors
    ///
    /// Returns `UnknownFactType` or `TypeMismatch` if the value cannot be
    /// read as the named type.
    pub fn insert(&mut self, fact_type: &str, value: impl Into<Value>) -> Result<FactHandle> {
        let type_id = self.knowledge.type_id(fact_type)?;
        let handle = self
            .staging
            .insert(self.knowledge.layout(type_id), value.into())?;
        self.queued += 1;
        Ok(handle)
    }

    /// Queues a new version of the fact bound to `var`.
    ///
    /// If an earlier action of the pass already changed the fact, nothing is
    /// queued and the bound handle is returned.
    ///
    /// # Errors
    ///
    /// Returns `StaleFact` if this action already updated or deleted it.
    pub fn update(&mut self, var: &str, value: impl Into<Value>) -> Result<FactHandle> {
        let handle = self.handle(var)?;
        if self.is_superseded(var) {
            trace!(rule = self.rule.name(), ?handle, "update of a changed fact dropped");
            return Ok(handle);
        }
        self.update_fact(handle, value)
    }

    /// Queues a new version of any current fact.
    ///
    /// # Errors
    ///
    /// Returns `UnknownFact` or `StaleFact` if `handle` is not the latest
    /// version of a live fact.
    pub fn update_fact(&mut self, handle: FactHandle, value: impl Into<Value>) -> Result<FactHandle> {
        let next = self
            .staging
            .update(self.knowledge.layouts(), handle, value.into())?;
        self.queued += 1;
        Ok(next)
    }

    /// Queues retraction of the fact bound to `var`.
    ///
    /// If an earlier action of the pass already changed the fact, nothing is
    /// queued.
    ///
    /// # Errors
    ///
    /// Returns `StaleFact` or `UnknownFact` if this action already updated
    /// or deleted it.
    pub fn delete(&mut self, var: &str) -> Result<()> {
        let handle = self.handle(var)?;
        if self.is_superseded(var) {
            trace!(rule = self.rule.name(), ?handle, "delete of a changed fact dropped");
            return Ok(());
        }
        self.delete_fact(handle)
    }

    fn is_superseded(&self, var: &str) -> bool {
        self.rule
            .var_index(var)
            .and_then(|i| self.superseded.get(i).copied())
            .unwrap_or(false)
    }

    /// Queues retraction of any current fact.
    ///
    /// # Errors
    ///
    /// Returns `UnknownFact` or `StaleFact` if `handle` is not the latest
    /// version of a live fact.
    pub fn delete_fact(&mut self, handle: FactHandle) -> Result<()> {
        self.staging.retract(handle)?;
        self.queued += 1;
        Ok(())
    }
}
