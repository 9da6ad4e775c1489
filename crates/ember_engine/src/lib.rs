//! Rule compilation, beta joins, agenda, and the session fire loop for Ember.
//!
//! This crate provides:
//! - [`RuleBuilder`] - Declarative rules over named fact variables
//! - [`Knowledge`] - A compiled, shareable rule set
//! - [`JoinNode`] - Incremental key joins with lazily invalidated rows
//! - [`RuleRuntime`] - Per-session match state and delta tracking of a rule
//! - [`ActionQueue`] - Pending inserts, updates and retracts by kind
//! - [`Session`] - Working memory plus the fire loop
//! - [`ActivationPolicy`] and [`SessionListener`] - Hooks into firing

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod action;
pub mod agenda;
pub mod beta;
pub mod condition;
pub mod config;
pub mod knowledge;
pub mod listener;
pub mod rhs;
pub mod rule;
pub mod runtime;
pub mod session;

mod staging;

pub use action::{ActionKind, ActionQueue};
pub use agenda::{ActivationPolicy, Agenda, AgendaEntry, DefaultPolicy};
pub use beta::{JoinCondition, JoinNode, JoinPlan, JoinRow};
pub use condition::{Condition, FieldRef};
pub use config::{EngineConfig, FireMode, Properties};
pub use knowledge::{Knowledge, KnowledgeBuilder};
pub use listener::{FactChange, FireReport, SessionListener, SessionPhase, StopReason};
pub use rhs::RhsContext;
pub use rule::{CompiledRule, GroupPlan, RuleBuilder, RuleDescriptor, RuleInfo, VarBinding};
pub use runtime::{Binding, FactGroup, RuleRuntime};
pub use session::{Session, SessionCloser};
