//! Per-type working memory.
//!
//! A [`TypeLayout`] is the compiled, immutable description of one fact type:
//! which fields the rules read, which alpha tests run, and which keyed
//! buckets the beta stage needs. A [`TypeMemory`] is one session's mutable
//! state for that type.
//!
//! Each bucket indexes the facts that pass a given set of alpha tests by a
//! given tuple of join fields. Loose fact variables (those joined with no
//! other variable) use a bucket with the empty key.

use std::collections::BTreeMap;
use std::sync::Arc;

use ember_foundation::{AlphaMask, FactHandle, Result, TypeId, Value};
use tracing::trace;

use crate::alpha::{AlphaEvaluator, AlphaStage};
use crate::fact::RuntimeFact;
use crate::index::FactIndex;
use crate::key::MemoryKey;
use crate::schema::FactTypeSchema;

// =============================================================================
// Layout
// =============================================================================

/// Index of a bucket within its type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BucketId(pub usize);

/// What a bucket selects and how it keys its facts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketSpec {
    /// Active-field positions forming the key, in key order.
    pub key_fields: Vec<usize>,
    /// Alpha bits a fact must carry to enter the bucket.
    pub alpha: AlphaMask,
}

/// Compiled layout of one fact type.
#[derive(Clone, Debug)]
pub struct TypeLayout {
    type_id: TypeId,
    schema: Arc<FactTypeSchema>,
    active: Vec<usize>,
    alpha: AlphaStage,
    buckets: Vec<BucketSpec>,
}

impl TypeLayout {
    /// Creates a layout with no active fields.
    #[must_use]
    pub fn new(type_id: TypeId, schema: Arc<FactTypeSchema>) -> Self {
        Self {
            type_id,
            schema,
            active: Vec::new(),
            alpha: AlphaStage::new(),
            buckets: Vec::new(),
        }
    }

    /// Returns the type id.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the schema.
    #[must_use]
    pub fn schema(&self) -> &FactTypeSchema {
        &self.schema
    }

    /// Returns the type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    /// Marks a schema field active and returns its active-field position.
    ///
    /// Activating an already active field returns its existing position.
    pub fn activate(&mut self, schema_field: usize) -> usize {
        if let Some(pos) = self.active.iter().position(|&f| f == schema_field) {
            return pos;
        }
        self.active.push(schema_field);
        self.active.len() - 1
    }

    /// Returns the names of the active fields, in active-field order.
    pub fn active_fields(&self) -> impl Iterator<Item = &str> {
        self.active.iter().map(|&f| &*self.schema.fields[f].name)
    }

    /// Adds an alpha evaluator and returns its bit index.
    ///
    /// # Errors
    ///
    /// Returns `LimitExceeded` if the type already has the maximum number of
    /// alpha evaluators.
    pub fn add_alpha(&mut self, evaluator: AlphaEvaluator) -> Result<usize> {
        let name = Arc::clone(&self.schema.name);
        self.alpha.add(&name, evaluator)
    }

    /// Returns the alpha stage.
    #[must_use]
    pub fn alpha(&self) -> &AlphaStage {
        &self.alpha
    }

    /// Returns the bucket for `spec`, creating it if needed.
    pub fn bucket(&mut self, spec: BucketSpec) -> BucketId {
        if let Some(i) = self.buckets.iter().position(|b| *b == spec) {
            return BucketId(i);
        }
        self.buckets.push(spec);
        BucketId(self.buckets.len() - 1)
    }

    /// Returns the bucket specs.
    #[must_use]
    pub fn buckets(&self) -> &[BucketSpec] {
        &self.buckets
    }

    /// Reads the active fields of `value` and runs the alpha stage.
    ///
    /// # Errors
    ///
    /// Returns a type mismatch if a field reads a value its declared type
    /// does not accept.
    pub fn build_fact(&self, handle: FactHandle, value: Value) -> Result<RuntimeFact> {
        let fields = self
            .active
            .iter()
            .map(|&f| self.schema.fields[f].extract(&value))
            .collect::<Result<Box<[Value]>>>()?;
        let alpha = self.alpha.evaluate(&fields);
        Ok(RuntimeFact::new(handle, self.type_id, value, fields, alpha))
    }
}

// =============================================================================
// Buckets
// =============================================================================

/// One keyed bucket: committed facts plus the pending insert delta.
#[derive(Clone, Debug)]
pub struct Bucket {
    spec: BucketSpec,
    main: FactIndex,
    delta: FactIndex,
    delete_delta: bool,
}

impl Bucket {
    fn new(spec: BucketSpec, capacity: usize) -> Self {
        Self {
            spec,
            main: FactIndex::with_capacity(capacity),
            delta: FactIndex::new(),
            delete_delta: false,
        }
    }

    /// Returns the bucket spec.
    #[must_use]
    pub fn spec(&self) -> &BucketSpec {
        &self.spec
    }

    /// Returns the committed index.
    #[must_use]
    pub fn main(&self) -> &FactIndex {
        &self.main
    }

    /// Returns the insert delta index.
    #[must_use]
    pub fn delta(&self) -> &FactIndex {
        &self.delta
    }

    /// Returns true if facts were inserted since the last commit.
    #[must_use]
    pub fn has_insert_delta(&self) -> bool {
        !self.delta.is_empty()
    }

    /// Returns true if committed facts were retracted since the last commit.
    #[must_use]
    pub fn has_delete_delta(&self) -> bool {
        self.delete_delta
    }

    /// Returns true if `fact` belongs in this bucket.
    #[must_use]
    pub fn accepts(&self, fact: &RuntimeFact) -> bool {
        fact.alpha().satisfies(self.spec.alpha)
    }

    /// Returns `fact`'s key in this bucket.
    #[must_use]
    pub fn key_of(&self, fact: &RuntimeFact) -> MemoryKey {
        MemoryKey::project(fact.fields(), &self.spec.key_fields)
    }
}

// =============================================================================
// Type Memory
// =============================================================================

/// All live facts of one type within a session.
#[derive(Clone, Debug)]
pub struct TypeMemory {
    layout: Arc<TypeLayout>,
    facts: BTreeMap<u64, Arc<RuntimeFact>>,
    buckets: Vec<Bucket>,
}

impl TypeMemory {
    /// Creates an empty memory for `layout`.
    #[must_use]
    pub fn new(layout: Arc<TypeLayout>, capacity: usize) -> Self {
        let buckets = layout
            .buckets
            .iter()
            .map(|spec| Bucket::new(spec.clone(), capacity))
            .collect();
        Self {
            layout,
            facts: BTreeMap::new(),
            buckets,
        }
    }

    /// Returns the layout.
    #[must_use]
    pub fn layout(&self) -> &TypeLayout {
        &self.layout
    }

    /// Returns the bucket with the given id.
    #[must_use]
    pub fn bucket(&self, id: BucketId) -> &Bucket {
        &self.buckets[id.0]
    }

    /// Iterates all buckets.
    pub fn buckets(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.iter()
    }

    /// Returns the number of live facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// Returns true if there are no live facts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Iterates live facts ordered by fact id.
    pub fn facts(&self) -> impl Iterator<Item = &Arc<RuntimeFact>> {
        self.facts.values()
    }

    /// Returns the live version of fact `id`.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<&Arc<RuntimeFact>> {
        self.facts.get(&id)
    }

    /// Returns the fact only if `handle` is its live version.
    #[must_use]
    pub fn current(&self, handle: FactHandle) -> Option<&Arc<RuntimeFact>> {
        self.facts.get(&handle.id).filter(|f| f.handle() == handle)
    }

    /// Returns true if `handle` names the live version of a fact.
    #[must_use]
    pub fn is_live(&self, handle: FactHandle) -> bool {
        self.current(handle).is_some()
    }

    /// Stores a fact and adds it to the insert delta of every bucket whose
    /// alpha requirement it meets.
    pub fn insert(&mut self, fact: Arc<RuntimeFact>) {
        trace!(handle = ?fact.handle(), ty = self.layout.name(), "insert");
        for bucket in &mut self.buckets {
            if bucket.accepts(&fact) {
                let key = bucket.key_of(&fact);
                bucket.delta.insert(key, fact.handle());
            }
        }
        self.facts.insert(fact.handle().id, fact);
    }

    /// Removes the live version named by `handle` from the memory and from
    /// every bucket index.
    ///
    /// Returns `None` if `handle` is not the live version.
    pub fn retract(&mut self, handle: FactHandle) -> Option<Arc<RuntimeFact>> {
        if !self.is_live(handle) {
            return None;
        }
        let fact = self.facts.remove(&handle.id)?;
        trace!(?handle, ty = self.layout.name(), "retract");
        for bucket in &mut self.buckets {
            if bucket.accepts(&fact) {
                let key = bucket.key_of(&fact);
                if bucket.main.remove(&key, handle) {
                    bucket.delete_delta = true;
                }
                bucket.delta.remove(&key, handle);
            }
        }
        Some(fact)
    }

    /// Merges every insert delta into its main index and clears both delta
    /// flags.
    pub fn commit(&mut self) {
        for bucket in &mut self.buckets {
            let Bucket {
                main,
                delta,
                delete_delta,
                ..
            } = bucket;
            main.merge(delta);
            *delete_delta = false;
        }
    }

    /// Drops emptied keys from every main index. Returns the number dropped.
    pub fn compact(&mut self) -> usize {
        self.buckets.iter_mut().map(|b| b.main.compact()).sum()
    }
}
