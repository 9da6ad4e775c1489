//! Session tracing and trace formatting for Ember.
//!
//! This crate provides:
//! - [`Tracer`] - A session listener recording fire-loop events
//! - [`TraceBuffer`] - Bounded record storage indexed by pass
//! - [`HumanFormatter`] and [`JsonFormatter`] - Trace output

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod trace;

pub use trace::{
    HumanFormatter, JsonFormatter, TraceBuffer, TraceEvent, TraceFormatter, TraceRecord, Tracer,
    TracerConfig,
};
