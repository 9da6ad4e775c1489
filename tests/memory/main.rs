//! Integration tests for Layer 1: Memory
//!
//! Tests for fact indexes, the alpha stage, schemas and type memories.

mod index;
mod schema;
