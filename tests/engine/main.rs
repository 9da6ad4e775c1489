//! Integration tests for Layer 2: Engine
//!
//! Tests for rule compilation, session fact operations, fire modes and
//! activation policies.

mod compile;
mod facts;
mod modes;
mod policy;
