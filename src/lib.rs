//! Ember - Forward-chaining production rule engine
//!
//! This crate re-exports all layers of the Ember system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: ember_debug      - Session tracing and trace formatting
//! Layer 2: ember_engine     - Knowledge, rules, beta joins, sessions
//! Layer 1: ember_memory     - Fact indexes, alpha stage, type memories
//! Layer 0: ember_foundation - Core types (Value, FactHandle, Error)
//! ```

pub use ember_debug as debug;
pub use ember_engine as engine;
pub use ember_foundation as foundation;
pub use ember_memory as memory;
