//! Core types, values, fact handles, and errors for Ember.
//!
//! This crate provides:
//! - [`Value`] - The dynamic value type carried by facts and field readers
//! - [`FactHandle`] - Versioned fact identifiers
//! - [`TypeId`] - Dense identifiers for declared fact types
//! - [`Type`] - Field type descriptors for schema validation
//! - [`AlphaMask`] - Fixed-width bitmask of alpha test results
//! - [`Error`] - Rich error types with context
//! - Persistent collections ([`PVec`], [`PMap`])

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod collections;
pub mod error;
pub mod handle;
pub mod mask;
pub mod types;
pub mod value;

pub use collections::{PMap, PVec};
pub use error::{Error, ErrorContext, ErrorKind, SemanticLimit};
pub use handle::{FactHandle, TypeId};
pub use mask::AlphaMask;
pub use types::Type;
pub use value::Value;

/// Result type alias using Ember's error type.
pub type Result<T> = std::result::Result<T, Error>;
