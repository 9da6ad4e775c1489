//! Rule runtime: one compiled rule bound to a session's working memory.

use std::fmt;
use std::sync::Arc;

use ember_foundation::FactHandle;
use ember_memory::{MemoryKey, RuntimeFact, WorkingMemory};

use crate::beta::{FactTuple, JoinNode, Source, VarView, cartesian};
use crate::rule::{CompiledRule, GroupPlan, RuleInfo};

// =============================================================================
// Binding
// =============================================================================

/// One fact per rule variable, in declaration order.
#[derive(Clone)]
pub struct Binding(Box<[Arc<RuntimeFact>]>);

impl Binding {
    /// Returns the fact bound to variable `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Arc<RuntimeFact>> {
        self.0.get(index)
    }

    /// Returns every bound fact.
    #[must_use]
    pub fn facts(&self) -> &[Arc<RuntimeFact>] {
        &self.0
    }

    /// Returns the handles of the bound facts.
    #[must_use]
    pub fn handles(&self) -> Vec<FactHandle> {
        self.0.iter().map(|f| f.handle()).collect()
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter().map(|f| f.handle())).finish()
    }
}

// =============================================================================
// Fact Groups
// =============================================================================

/// Match state of one fact group.
#[derive(Clone, Debug)]
pub enum FactGroup {
    /// A variable read straight from its bucket.
    Alpha {
        /// Rule variable index.
        var: usize,
    },
    /// Variables matched through a join node.
    Beta(JoinNode),
}

impl FactGroup {
    fn vars(&self) -> &[usize] {
        match self {
            Self::Alpha { var } => std::slice::from_ref(var),
            Self::Beta(node) => node.plan().vars(),
        }
    }

    fn tuples(&self, views: &[VarView<'_>], source: Source) -> Vec<FactTuple> {
        match self {
            Self::Alpha { var } => views[*var]
                .facts(&MemoryKey::Empty, source)
                .into_iter()
                .map(|f| vec![f])
                .collect(),
            Self::Beta(node) => node.main_tuples(&group_views(node, views)),
        }
    }
}

fn group_views<'a>(node: &JoinNode, views: &[VarView<'a>]) -> Vec<VarView<'a>> {
    node.plan().vars().iter().map(|&v| views[v]).collect()
}

fn views<'a>(rule: &CompiledRule, memory: &'a WorkingMemory) -> Vec<VarView<'a>> {
    rule.vars()
        .iter()
        .map(|v| {
            let type_memory = memory.type_memory(v.type_id);
            VarView::new(type_memory, type_memory.bucket(v.bucket))
        })
        .collect()
}

// =============================================================================
// Rule Runtime
// =============================================================================

/// Per-session state of one rule.
#[derive(Clone, Debug)]
pub struct RuleRuntime {
    rule: Arc<CompiledRule>,
    groups: Vec<FactGroup>,
}

impl RuleRuntime {
    /// Creates a runtime with empty join memories.
    #[must_use]
    pub fn new(rule: Arc<CompiledRule>) -> Self {
        let groups = rule
            .groups()
            .iter()
            .map(|plan| match plan {
                GroupPlan::Loose { var } => FactGroup::Alpha { var: *var },
                GroupPlan::Joined(join) => FactGroup::Beta(JoinNode::new(Arc::clone(join))),
            })
            .collect();
        Self { rule, groups }
    }

    /// Returns the compiled rule.
    #[must_use]
    pub fn rule(&self) -> &Arc<CompiledRule> {
        &self.rule
    }

    /// Returns name, salience and declaration order.
    #[must_use]
    pub fn info(&self) -> &RuleInfo {
        self.rule.info()
    }

    /// Returns the fact groups.
    #[must_use]
    pub fn groups(&self) -> &[FactGroup] {
        &self.groups
    }

    /// Returns true if any bucket this rule reads has uncommitted inserts.
    #[must_use]
    pub fn has_insert_delta(&self, memory: &WorkingMemory) -> bool {
        views(&self.rule, memory)
            .iter()
            .any(|v| v.bucket().has_insert_delta())
    }

    /// Returns true if any bucket this rule reads lost a committed fact
    /// since the last commit.
    #[must_use]
    pub fn has_delete_delta(&self, memory: &WorkingMemory) -> bool {
        views(&self.rule, memory)
            .iter()
            .any(|v| v.bucket().has_delete_delta())
    }

    /// Returns the bindings that include at least one uncommitted fact.
    ///
    /// Records new join rows as a side effect, so each call should be
    /// followed by a commit of the working memory.
    pub fn propagate(&mut self, memory: &WorkingMemory) -> Vec<Binding> {
        let views = views(&self.rule, memory);
        let deltas: Vec<Vec<FactTuple>> = self
            .groups
            .iter_mut()
            .map(|group| match group {
                FactGroup::Alpha { var } => views[*var]
                    .facts(&MemoryKey::Empty, Source::Delta)
                    .into_iter()
                    .map(|f| vec![f])
                    .collect(),
                FactGroup::Beta(node) => {
                    let group_views = group_views(node, &views);
                    node.propagate(&group_views)
                }
            })
            .collect();

        let n = self.groups.len();
        let mut mains: Vec<Option<Vec<FactTuple>>> = (0..n).map(|_| None).collect();
        let mut combos = Vec::new();
        for pivot in 0..n {
            if deltas[pivot].is_empty() {
                continue;
            }
            let mut lists = Vec::with_capacity(n);
            for g in 0..n {
                let list = if g == pivot {
                    deltas[g].clone()
                } else {
                    let main = mains[g]
                        .get_or_insert_with(|| self.groups[g].tuples(&views, Source::Main));
                    let mut list = main.clone();
                    if g > pivot {
                        list.extend(deltas[g].iter().cloned());
                    }
                    list
                };
                lists.push(list);
            }
            cartesian(&lists, &mut combos);
        }

        combos.iter().filter_map(|c| self.assemble(c)).collect()
    }

    /// Enumerates every committed binding.
    ///
    /// Each call re-reads the working memory, so the result reflects
    /// retractions without a prior compaction.
    #[must_use]
    pub fn matches(&self, memory: &WorkingMemory) -> Vec<Binding> {
        let views = views(&self.rule, memory);
        let lists: Vec<Vec<FactTuple>> = self
            .groups
            .iter()
            .map(|g| g.tuples(&views, Source::Main))
            .collect();
        let mut combos = Vec::new();
        cartesian(&lists, &mut combos);
        combos.iter().filter_map(|c| self.assemble(c)).collect()
    }

    /// Drops invalid join rows. Returns the number dropped.
    pub fn compact(&mut self, memory: &WorkingMemory) -> usize {
        let views = views(&self.rule, memory);
        self.groups
            .iter_mut()
            .map(|group| match group {
                FactGroup::Alpha { .. } => 0,
                FactGroup::Beta(node) => {
                    let group_views = group_views(node, &views);
                    node.compact(&group_views)
                }
            })
            .sum()
    }

    /// Places each group's tuple into its variables' slots.
    fn assemble(&self, combo: &[FactTuple]) -> Option<Binding> {
        let mut slots: Vec<Option<Arc<RuntimeFact>>> = vec![None; self.rule.vars().len()];
        for (group, tuple) in self.groups.iter().zip(combo) {
            for (&var, fact) in group.vars().iter().zip(tuple) {
                slots[var] = Some(Arc::clone(fact));
            }
        }
        slots
            .into_iter()
            .collect::<Option<Box<[_]>>>()
            .map(Binding)
    }
}
