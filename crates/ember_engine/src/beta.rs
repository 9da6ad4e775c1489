//! Beta stage: incremental joins over keyed buckets.
//!
//! A join node matches the keys of two or more fact variables rather than the
//! facts themselves: every condition of a join plan reads only key fields, so
//! a combination of keys either satisfies the plan or not, regardless of how
//! many facts share each key. Matching key combinations are kept as
//! [`JoinRow`]s and expanded into fact tuples on demand.
//!
//! Rows are never removed when facts are retracted. A row is valid only while
//! each of its keys still holds at least one committed fact; invalid rows are
//! skipped when read and dropped by [`JoinNode::compact`].

use std::collections::HashSet;
use std::sync::Arc;

use ember_foundation::{FactHandle, Value};
use ember_memory::{Bucket, Evaluator, FactIndex, MemoryKey, RuntimeFact, TypeMemory};
use tracing::trace;

/// Facts bound to the variables of one group, in group order.
pub type FactTuple = Vec<Arc<RuntimeFact>>;

// =============================================================================
// Join Plan
// =============================================================================

/// A multi-variable condition over key components.
#[derive(Clone, Debug)]
pub struct JoinCondition {
    evaluator: Evaluator,
    args: Vec<(usize, usize)>,
    ready_at: usize,
}

impl JoinCondition {
    /// Creates a join condition.
    ///
    /// Each argument is a (group position, key component) pair.
    #[must_use]
    pub fn new(evaluator: Evaluator, args: Vec<(usize, usize)>) -> Self {
        let ready_at = args.iter().map(|(pos, _)| *pos).max().unwrap_or(0);
        Self {
            evaluator,
            args,
            ready_at,
        }
    }

    /// Returns the last group position this condition reads.
    ///
    /// The condition can be tested as soon as that position is bound.
    #[must_use]
    pub fn ready_at(&self) -> usize {
        self.ready_at
    }

    fn test(&self, row: &[Option<&MemoryKey>]) -> bool {
        let values: Vec<Value> = self
            .args
            .iter()
            .map(|&(pos, component)| component_of(row, pos, component))
            .collect();
        self.evaluator.test(&values)
    }

    /// Returns the argument that `(pos, component)` must equal, if this is an
    /// equality over an argument bound before step `step`.
    fn equal_to(
        &self,
        pos: usize,
        component: usize,
        step_of: &[usize],
        step: usize,
    ) -> Option<(usize, usize)> {
        if !self.evaluator.is_equality() || !self.args.contains(&(pos, component)) {
            return None;
        }
        self.args.iter().copied().find(|&(q, _)| step_of[q] < step)
    }
}

fn component_of(row: &[Option<&MemoryKey>], pos: usize, component: usize) -> Value {
    row[pos]
        .and_then(|key| key.get(component))
        .cloned()
        .unwrap_or(Value::Nil)
}

/// The variables and conditions of one joined group.
#[derive(Clone, Debug)]
pub struct JoinPlan {
    vars: Vec<usize>,
    conditions: Vec<JoinCondition>,
}

impl JoinPlan {
    /// Creates a plan over rule variables `vars` (in group order).
    #[must_use]
    pub fn new(vars: Vec<usize>, conditions: Vec<JoinCondition>) -> Self {
        Self { vars, conditions }
    }

    /// Returns the rule variable indexes, in group order.
    #[must_use]
    pub fn vars(&self) -> &[usize] {
        &self.vars
    }

    /// Returns the conditions.
    #[must_use]
    pub fn conditions(&self) -> &[JoinCondition] {
        &self.conditions
    }
}

// =============================================================================
// Sources
// =============================================================================

/// Which part of a bucket a variable reads during one enumeration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// Committed facts only.
    Main,
    /// Facts inserted since the last commit only.
    Delta,
    /// Both.
    All,
}

/// Read access to the bucket one variable is bound to.
#[derive(Copy, Clone, Debug)]
pub struct VarView<'a> {
    memory: &'a TypeMemory,
    bucket: &'a Bucket,
}

impl<'a> VarView<'a> {
    /// Creates a view over `bucket` of `memory`.
    #[must_use]
    pub fn new(memory: &'a TypeMemory, bucket: &'a Bucket) -> Self {
        Self { memory, bucket }
    }

    /// Returns the bucket.
    #[must_use]
    pub fn bucket(&self) -> &'a Bucket {
        self.bucket
    }

    /// Live keys of `source`, in first-insertion order.
    #[must_use]
    pub fn keys(&self, source: Source) -> Vec<&'a MemoryKey> {
        let main = self.bucket.main();
        let delta = self.bucket.delta();
        match source {
            Source::Main => main.live_keys().collect(),
            Source::Delta => delta.live_keys().collect(),
            Source::All => main
                .live_keys()
                .chain(delta.live_keys().filter(|k| !main.has_live(k)))
                .collect(),
        }
    }

    /// Returns the stored copy of `key` if it is live in `source`.
    #[must_use]
    pub fn live_key(&self, key: &MemoryKey, source: Source) -> Option<&'a MemoryKey> {
        let main = self.bucket.main();
        let delta = self.bucket.delta();
        let live = |index: &'a FactIndex| {
            index.entry(key).filter(|e| e.is_live()).map(|e| e.key())
        };
        match source {
            Source::Main => live(main),
            Source::Delta => live(delta),
            Source::All => live(main).or_else(|| live(delta)),
        }
    }

    /// Facts stored under `key` in `source`, ordered by fact id.
    #[must_use]
    pub fn facts(&self, key: &MemoryKey, source: Source) -> Vec<Arc<RuntimeFact>> {
        let main = self.bucket.main();
        let delta = self.bucket.delta();
        let handles: Vec<FactHandle> = match source {
            Source::Main => main.lookup(key).collect(),
            Source::Delta => delta.lookup(key).collect(),
            Source::All => main.lookup(key).chain(delta.lookup(key)).collect(),
        };
        handles
            .into_iter()
            .filter_map(|h| self.memory.current(h).cloned())
            .collect()
    }
}

// =============================================================================
// Join Node
// =============================================================================

/// One beta-stage match: a key per group variable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct JoinRow(Box<[MemoryKey]>);

impl JoinRow {
    /// Returns the keys, in group order.
    #[must_use]
    pub fn keys(&self) -> &[MemoryKey] {
        &self.0
    }

    /// Returns true if every key still holds a committed fact.
    #[must_use]
    pub fn is_valid(&self, views: &[VarView<'_>]) -> bool {
        self.0
            .iter()
            .zip(views)
            .all(|(key, view)| view.bucket.main().has_live(key))
    }
}

/// Join state of one joined group within one rule runtime.
#[derive(Clone, Debug)]
pub struct JoinNode {
    plan: Arc<JoinPlan>,
    rows: Vec<JoinRow>,
    known: HashSet<JoinRow>,
}

impl JoinNode {
    /// Creates an empty join node.
    #[must_use]
    pub fn new(plan: Arc<JoinPlan>) -> Self {
        Self {
            plan,
            rows: Vec::new(),
            known: HashSet::new(),
        }
    }

    /// Returns the plan.
    #[must_use]
    pub fn plan(&self) -> &JoinPlan {
        &self.plan
    }

    /// Returns every stored row, valid or not.
    #[must_use]
    pub fn rows(&self) -> &[JoinRow] {
        &self.rows
    }

    /// Iterates rows whose keys all hold committed facts.
    pub fn valid_rows<'s>(
        &'s self,
        views: &'s [VarView<'_>],
    ) -> impl Iterator<Item = &'s JoinRow> + 's {
        self.rows.iter().filter(move |row| row.is_valid(views))
    }

    /// Finds tuples containing at least one uncommitted fact and records
    /// their rows.
    ///
    /// For pivot position `i`, variables before `i` read committed facts,
    /// variable `i` reads the delta, and later variables read both. Every new
    /// tuple is produced by exactly one pivot: the position of its first
    /// uncommitted fact.
    pub fn propagate(&mut self, views: &[VarView<'_>]) -> Vec<FactTuple> {
        let n = self.plan.vars.len();
        let mut tuples = Vec::new();
        for pivot in 0..n {
            if !views[pivot].bucket.has_insert_delta() {
                continue;
            }
            let sources: Vec<Source> = (0..n)
                .map(|j| match j.cmp(&pivot) {
                    std::cmp::Ordering::Less => Source::Main,
                    std::cmp::Ordering::Equal => Source::Delta,
                    std::cmp::Ordering::Greater => Source::All,
                })
                .collect();
            for row in self.join(views, &sources, pivot) {
                expand(views, row.keys(), &sources, &mut tuples);
                if self.known.insert(row.clone()) {
                    self.rows.push(row);
                }
            }
        }
        trace!(rows = self.rows.len(), new = tuples.len(), "join propagated");
        tuples
    }

    /// Expands every valid row into committed fact tuples.
    #[must_use]
    pub fn main_tuples(&self, views: &[VarView<'_>]) -> Vec<FactTuple> {
        let sources = vec![Source::Main; self.plan.vars.len()];
        let mut tuples = Vec::new();
        for row in self.valid_rows(views) {
            expand(views, row.keys(), &sources, &mut tuples);
        }
        tuples
    }

    /// Drops invalid rows. Returns the number dropped.
    pub fn compact(&mut self, views: &[VarView<'_>]) -> usize {
        let before = self.rows.len();
        self.rows.retain(|row| row.is_valid(views));
        let dropped = before - self.rows.len();
        if dropped > 0 {
            self.known = self.rows.iter().cloned().collect();
        }
        dropped
    }

    /// Enumerates key combinations satisfying every condition.
    ///
    /// Position `first` is bound before the others. A position whose key
    /// components are all equated with components bound earlier is looked
    /// up in its index; any other position scans its live keys.
    fn join<'k>(&self, views: &[VarView<'k>], sources: &[Source], first: usize) -> Vec<JoinRow> {
        let n = views.len();
        let order: Vec<usize> = std::iter::once(first)
            .chain((0..n).filter(|&p| p != first))
            .collect();
        let mut step_of = vec![0; n];
        for (step, &pos) in order.iter().enumerate() {
            step_of[pos] = step;
        }

        let steps: Vec<Step<'_, 'k>> = order
            .iter()
            .enumerate()
            .map(|(step, &pos)| {
                let ready = self
                    .plan
                    .conditions
                    .iter()
                    .filter(|c| c.args.iter().map(|&(q, _)| step_of[q]).max() == Some(step))
                    .collect();
                let width = views[pos].bucket.spec().key_fields.len();
                let probe = self.probe(pos, width, &step_of, step);
                let keys = match probe {
                    Some(_) => Vec::new(),
                    None => views[pos].keys(sources[pos]),
                };
                Step {
                    pos,
                    ready,
                    probe,
                    keys,
                }
            })
            .collect();

        let mut rows = Vec::new();
        if steps.iter().any(|s| s.probe.is_none() && s.keys.is_empty()) {
            return rows;
        }
        let mut row = vec![None; n];
        descend(&steps, views, sources, &mut row, &mut rows);
        rows
    }

    /// For each key component of `pos`, an earlier-bound component it must
    /// equal. `None` unless every component is covered.
    fn probe(
        &self,
        pos: usize,
        width: usize,
        step_of: &[usize],
        step: usize,
    ) -> Option<Vec<(usize, usize)>> {
        if width == 0 {
            return None;
        }
        (0..width)
            .map(|component| {
                self.plan
                    .conditions
                    .iter()
                    .find_map(|c| c.equal_to(pos, component, step_of, step))
            })
            .collect()
    }
}

/// One position of a join enumeration.
struct Step<'c, 'k> {
    pos: usize,
    /// Conditions whose last argument is bound at this step.
    ready: Vec<&'c JoinCondition>,
    /// Components to build the lookup key from, when the key is determined.
    probe: Option<Vec<(usize, usize)>>,
    /// Candidate keys when scanning.
    keys: Vec<&'k MemoryKey>,
}

fn descend<'k>(
    steps: &[Step<'_, 'k>],
    views: &[VarView<'k>],
    sources: &[Source],
    row: &mut [Option<&'k MemoryKey>],
    out: &mut Vec<JoinRow>,
) {
    let Some((step, rest)) = steps.split_first() else {
        out.push(JoinRow(row.iter().flatten().map(|k| (*k).clone()).collect()));
        return;
    };
    let mut bind = |key: &'k MemoryKey, row: &mut [Option<&'k MemoryKey>]| {
        row[step.pos] = Some(key);
        if step.ready.iter().all(|c| c.test(row)) {
            descend(rest, views, sources, row, out);
        }
        row[step.pos] = None;
    };
    match &step.probe {
        Some(components) => {
            let values: Vec<Value> = components
                .iter()
                .map(|&(q, c)| component_of(row, q, c))
                .collect();
            let wanted = MemoryKey::from_values(&values);
            if let Some(key) = views[step.pos].live_key(&wanted, sources[step.pos]) {
                bind(key, row);
            }
        }
        None => {
            for &key in &step.keys {
                bind(key, row);
            }
        }
    }
}

/// Appends the cross product of the facts under `keys` to `out`.
fn expand(views: &[VarView<'_>], keys: &[MemoryKey], sources: &[Source], out: &mut Vec<FactTuple>) {
    let lists: Vec<Vec<Arc<RuntimeFact>>> = views
        .iter()
        .zip(keys)
        .zip(sources)
        .map(|((view, key), source)| view.facts(key, *source))
        .collect();
    cartesian(&lists, out);
}

/// Appends every combination taking one element from each list, first list
/// outermost. Appends nothing if any list is empty.
pub(crate) fn cartesian<T: Clone>(lists: &[Vec<T>], out: &mut Vec<Vec<T>>) {
    if lists.iter().any(Vec::is_empty) {
        return;
    }
    let mut idx = vec![0; lists.len()];
    loop {
        out.push(idx.iter().zip(lists).map(|(&i, l)| l[i].clone()).collect());
        let mut p = lists.len();
        loop {
            if p == 0 {
                return;
            }
            p -= 1;
            idx[p] += 1;
            if idx[p] < lists[p].len() {
                break;
            }
            idx[p] = 0;
        }
    }
}
