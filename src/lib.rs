//! Code execution tracing engine
//!
//! Runs short, untrusted programs in one of several languages and produces a
//! normalized, step-by-step execution trace for driving a visual debugger.
//! Three execution strategies sit behind one contract:
//! - an introspective tracer for Python (line-level steps via an external
//!   trace harness process)
//! - a process-isolated runner for JavaScript (one coarse-grained step)
//! - a compile-then-run pipeline for C (one coarse-grained step)
//!
//! Every strategy enforces the per-request wall-clock bound, caps captured
//! state through the value formatter, and owns its temporary artifacts for
//! exactly the duration of the call.
//!
//! This engine is not a security boundary: child processes run with the
//! worker's own privileges. OS-level sandboxing is the operator's
//! responsibility.

pub mod error;
pub mod executor;
pub mod format;
pub mod languages;
pub mod runner;
pub mod trace;

#[cfg(test)]
pub(crate) mod testutil;
