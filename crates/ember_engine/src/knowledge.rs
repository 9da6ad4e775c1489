//! Compiled rule sets.
//!
//! A [`Knowledge`] is the immutable result of compiling fact type
//! declarations and rules. It is cheap to clone and shared by every session
//! created from it, possibly across threads.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ember_foundation::{Error, Result, TypeId};
use ember_memory::{FactTypeSchema, TypeLayout};
use tracing::debug;

use crate::config::{EngineConfig, Properties};
use crate::rule::{CompiledRule, RuleCompiler, RuleDescriptor};
use crate::session::Session;

// =============================================================================
// Builder
// =============================================================================

/// Collects fact types and rules for compilation.
#[derive(Debug, Default)]
pub struct KnowledgeBuilder {
    types: Vec<FactTypeSchema>,
    rules: Vec<RuleDescriptor>,
    properties: Properties,
}

impl KnowledgeBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a fact type.
    #[must_use]
    pub fn declare(mut self, schema: FactTypeSchema) -> Self {
        self.types.push(schema);
        self
    }

    /// Adds a rule.
    #[must_use]
    pub fn rule(mut self, descriptor: RuleDescriptor) -> Self {
        self.rules.push(descriptor);
        self
    }

    /// Sets a property inherited by every session.
    #[must_use]
    pub fn property(mut self, key: &str, value: &str) -> Self {
        self.properties.set(key, value);
        self
    }

    /// Compiles the declarations.
    ///
    /// Rules are ordered by salience, highest first; rules of equal salience
    /// keep their declaration order.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateDeclaration` for repeated type or rule names and any
    /// compile error reported for a rule.
    pub fn build(self) -> Result<Knowledge> {
        let mut names = HashMap::with_capacity(self.types.len());
        let mut layouts = Vec::with_capacity(self.types.len());
        for (i, schema) in self.types.into_iter().enumerate() {
            let id = TypeId(u32::try_from(i).map_err(|_| Error::compile("too many fact types"))?);
            if names.insert(schema.name.to_string(), id).is_some() {
                return Err(Error::duplicate(format!("fact type {}", schema.name)));
            }
            layouts.push(TypeLayout::new(id, Arc::new(schema)));
        }

        let mut rules: Vec<Arc<CompiledRule>> = Vec::with_capacity(self.rules.len());
        {
            let mut compiler = RuleCompiler::new(&mut layouts, &names);
            for (order, descriptor) in self.rules.iter().enumerate() {
                if rules.iter().any(|r| r.name() == descriptor.name) {
                    return Err(Error::duplicate(format!("rule {}", descriptor.name)));
                }
                rules.push(Arc::new(compiler.compile(descriptor, order)?));
            }
        }
        rules.sort_by(|a, b| b.salience().cmp(&a.salience()));

        debug!(
            types = layouts.len(),
            rules = rules.len(),
            "knowledge compiled"
        );

        Ok(Knowledge(Arc::new(Inner {
            layouts: layouts.into_iter().map(Arc::new).collect(),
            names,
            rules,
            properties: self.properties,
            open_sessions: AtomicUsize::new(0),
        })))
    }
}

// =============================================================================
// Knowledge
// =============================================================================

struct Inner {
    layouts: Vec<Arc<TypeLayout>>,
    names: HashMap<String, TypeId>,
    rules: Vec<Arc<CompiledRule>>,
    properties: Properties,
    open_sessions: AtomicUsize,
}

/// An immutable compiled rule set.
#[derive(Clone)]
pub struct Knowledge(Arc<Inner>);

impl Knowledge {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> KnowledgeBuilder {
        KnowledgeBuilder::new()
    }

    /// Creates a session with empty working memory.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if the knowledge properties are invalid.
    pub fn new_session(&self) -> Result<Session> {
        let config = EngineConfig::from_properties(&self.0.properties)?;
        self.0.open_sessions.fetch_add(1, Ordering::AcqRel);
        Ok(Session::new(self.clone(), &config))
    }

    /// Resolves a fact type name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownFactType` if the name was never declared.
    pub fn type_id(&self, name: &str) -> Result<TypeId> {
        self.0
            .names
            .get(name)
            .copied()
            .ok_or_else(|| Error::unknown_type(name))
    }

    /// Returns the layout of a fact type.
    ///
    /// # Panics
    ///
    /// Panics if `type_id` was not produced by this knowledge.
    #[must_use]
    pub fn layout(&self, type_id: TypeId) -> &TypeLayout {
        &self.0.layouts[type_id.index()]
    }

    /// Returns every layout, indexed by `TypeId`.
    #[must_use]
    pub fn layouts(&self) -> &[Arc<TypeLayout>] {
        &self.0.layouts
    }

    /// Returns the compiled rules in firing order.
    #[must_use]
    pub fn rules(&self) -> &[Arc<CompiledRule>] {
        &self.0.rules
    }

    /// Looks up a compiled rule by name.
    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&Arc<CompiledRule>> {
        self.0.rules.iter().find(|r| r.name() == name)
    }

    /// Returns the properties sessions start with.
    #[must_use]
    pub fn properties(&self) -> &Properties {
        &self.0.properties
    }

    /// Returns the number of sessions created and not yet closed.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.0.open_sessions.load(Ordering::Acquire)
    }

    pub(crate) fn session_closed(&self) {
        self.0.open_sessions.fetch_sub(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for Knowledge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Knowledge")
            .field("types", &self.0.names.len())
            .field("rules", &self.0.rules.len())
            .field("open_sessions", &self.open_sessions())
            .finish()
    }
}
