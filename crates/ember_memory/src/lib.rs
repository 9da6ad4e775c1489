//! Fact type schemas, fact indexes, alpha stage, and per-type working memory
//! for Ember.
//!
//! This crate provides:
//! - [`FactTypeSchema`] - Declared fact types and their field readers
//! - [`MemoryKey`] - Value-equality join keys (single- and multi-field)
//! - [`FactIndex`] - Key tuple → fact handle index with delta merging
//! - [`AlphaStage`] - Per-type alpha evaluators producing an [`AlphaMask`]
//! - [`RuntimeFact`] - Immutable fact snapshot with cached field values
//! - [`TypeMemory`] - All live facts of one type plus their keyed buckets
//! - [`WorkingMemory`] - The type memories of one session
//!
//! [`AlphaMask`]: ember_foundation::AlphaMask

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod alpha;
pub mod evaluator;
pub mod fact;
pub mod index;
pub mod key;
pub mod schema;
pub mod type_memory;
pub mod working;

pub use alpha::{AlphaEvaluator, AlphaStage};
pub use evaluator::Evaluator;
pub use fact::RuntimeFact;
pub use index::{FactIndex, IndexEntry};
pub use key::MemoryKey;
pub use schema::{FactTypeSchema, FieldReader, FieldSchema};
pub use type_memory::{Bucket, BucketId, BucketSpec, TypeLayout, TypeMemory};
pub use working::WorkingMemory;
