//! Rule compiler - resolves rule descriptors against declared fact types.
//!
//! Compilation activates the fields each condition reads, registers
//! single-variable conditions as alpha evaluators on the variable's type,
//! groups variables connected by multi-variable conditions into join plans,
//! and picks the keyed bucket every variable reads from.

use std::collections::HashMap;
use std::sync::Arc;

use ember_foundation::{AlphaMask, Error, Result, TypeId};
use ember_memory::{AlphaEvaluator, BucketSpec, Evaluator, TypeLayout};
use tracing::debug;

use super::{CompiledRule, GroupPlan, RuleDescriptor, RuleInfo, VarBinding};
use crate::beta::{JoinCondition, JoinPlan};
use crate::condition::FieldRef;

/// A condition over two or more variables, with resolved arguments.
struct BetaCondition {
    evaluator: Evaluator,
    /// (rule variable, key component) per argument.
    args: Vec<(usize, usize)>,
}

/// Compiles rule descriptors against a set of type layouts.
pub struct RuleCompiler<'a> {
    layouts: &'a mut [TypeLayout],
    names: &'a HashMap<String, TypeId>,
}

impl<'a> RuleCompiler<'a> {
    /// Creates a compiler over mutable layouts, indexed by `TypeId`.
    pub fn new(layouts: &'a mut [TypeLayout], names: &'a HashMap<String, TypeId>) -> Self {
        Self { layouts, names }
    }

    /// Compiles one rule.
    ///
    /// # Errors
    ///
    /// Returns a compile-time error for duplicate or missing fact variables,
    /// unknown fact types or fields, malformed field references, evaluator
    /// arity mismatches, and types exceeding the alpha evaluator limit.
    pub fn compile(&mut self, descriptor: &RuleDescriptor, order: usize) -> Result<CompiledRule> {
        let name = descriptor.name.as_str();
        if descriptor.facts.is_empty() {
            return Err(Error::compile(format!(
                "rule {name} declares no fact variables"
            )));
        }

        // Fact variables
        let mut vars: Vec<(Arc<str>, TypeId)> = Vec::with_capacity(descriptor.facts.len());
        for decl in &descriptor.facts {
            if vars.iter().any(|(v, _)| **v == *decl.var) {
                return Err(Error::duplicate(format!(
                    "fact variable {} in rule {name}",
                    decl.var
                )));
            }
            let type_id = *self
                .names
                .get(&decl.fact_type)
                .ok_or_else(|| Error::unknown_type(decl.fact_type.as_str()))?;
            vars.push((decl.var.as_str().into(), type_id));
        }

        // Conditions
        let mut required = vec![AlphaMask::EMPTY; vars.len()];
        let mut key_fields: Vec<Vec<usize>> = vec![Vec::new(); vars.len()];
        let mut beta = Vec::new();

        for condition in &descriptor.conditions {
            if condition.refs.is_empty() {
                return Err(Error::compile(format!(
                    "rule {name}: condition references no fields"
                )));
            }
            if condition.evaluator.arity() != condition.refs.len() {
                return Err(Error::compile(format!(
                    "rule {name}: evaluator expects {} values but {} fields are referenced",
                    condition.evaluator.arity(),
                    condition.refs.len()
                )));
            }

            let args = condition
                .refs
                .iter()
                .map(|r| self.resolve(&vars, r))
                .collect::<Result<Vec<_>>>()?;

            let first = args[0].0;
            if args.iter().all(|(v, _)| *v == first) {
                let positions = args.iter().map(|(_, p)| *p).collect();
                let layout = &mut self.layouts[vars[first].1.index()];
                let bit = layout.add_alpha(AlphaEvaluator::new(
                    condition.evaluator.clone(),
                    positions,
                ))?;
                required[first] = required[first].with(bit);
            } else {
                let args = args
                    .into_iter()
                    .map(|(v, p)| (v, key_component(&mut key_fields[v], p)))
                    .collect();
                beta.push(BetaCondition {
                    evaluator: condition.evaluator.clone(),
                    args,
                });
            }
        }

        let groups = plan_groups(vars.len(), &beta);

        let bindings = vars
            .iter()
            .enumerate()
            .map(|(i, (var, type_id))| VarBinding {
                name: Arc::clone(var),
                type_id: *type_id,
                bucket: self.layouts[type_id.index()].bucket(BucketSpec {
                    key_fields: key_fields[i].clone(),
                    alpha: required[i],
                }),
            })
            .collect();

        debug!(
            rule = name,
            vars = vars.len(),
            groups = groups.len(),
            beta_conditions = beta.len(),
            "compiled rule"
        );

        Ok(CompiledRule {
            info: RuleInfo {
                name: name.into(),
                salience: descriptor.salience,
                order,
            },
            properties: descriptor.properties.clone(),
            vars: bindings,
            groups,
            rhs: descriptor.rhs.clone(),
        })
    }

    /// Resolves `$var.field` to (variable index, active-field position).
    fn resolve(&mut self, vars: &[(Arc<str>, TypeId)], reference: &str) -> Result<(usize, usize)> {
        let field_ref = FieldRef::parse(reference)?;
        let var = vars
            .iter()
            .position(|(v, _)| **v == *field_ref.var)
            .ok_or_else(|| Error::unresolved(reference))?;
        let layout = &mut self.layouts[vars[var].1.index()];
        let schema_field = layout
            .schema()
            .field_position(&field_ref.field)
            .ok_or_else(|| Error::unknown_field(layout.name(), field_ref.field.as_str()))?;
        Ok((var, layout.activate(schema_field)))
    }
}

/// Returns the key component reading active field `field`, adding it to the
/// key if needed.
fn key_component(key_fields: &mut Vec<usize>, field: usize) -> usize {
    if let Some(component) = key_fields.iter().position(|&k| k == field) {
        return component;
    }
    key_fields.push(field);
    key_fields.len() - 1
}

/// Splits variables into connected components over the beta conditions.
///
/// Groups are ordered by their first variable; variables within a group
/// keep declaration order.
fn plan_groups(var_count: usize, beta: &[BetaCondition]) -> Vec<GroupPlan> {
    let mut parent: Vec<usize> = (0..var_count).collect();
    for condition in beta {
        let first = condition.args[0].0;
        for &(v, _) in &condition.args[1..] {
            union(&mut parent, first, v);
        }
    }

    let roots: Vec<usize> = (0..var_count).map(|v| find(&mut parent, v)).collect();

    // Position of every variable within its group.
    let mut slot = vec![0; var_count];
    let mut members: Vec<(usize, Vec<usize>)> = Vec::new();
    for (var, &root) in roots.iter().enumerate() {
        match members.iter_mut().find(|(r, _)| *r == root) {
            Some((_, group)) => {
                slot[var] = group.len();
                group.push(var);
            }
            None => members.push((root, vec![var])),
        }
    }

    members
        .into_iter()
        .map(|(root, group)| {
            if group.len() == 1 {
                return GroupPlan::Loose { var: group[0] };
            }
            let conditions = beta
                .iter()
                .filter(|c| roots[c.args[0].0] == root)
                .map(|c| {
                    let args = c.args.iter().map(|&(v, component)| (slot[v], component)).collect();
                    JoinCondition::new(c.evaluator.clone(), args)
                })
                .collect();
            GroupPlan::Joined(Arc::new(JoinPlan::new(group, conditions)))
        })
        .collect()
}

fn find(parent: &mut [usize], x: usize) -> usize {
    let mut root = x;
    while parent[root] != root {
        root = parent[root];
    }
    let mut node = x;
    while parent[node] != root {
        let next = parent[node];
        parent[node] = root;
        node = next;
    }
    root
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        // Lower index wins so roots follow declaration order.
        let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
        parent[hi] = lo;
    }
}
