//! Executor contract and language dispatch
//!
//! Every language strategy satisfies the same two-operation contract:
//! - `execute_with_trace`: run the program and return a step-by-step trace
//! - `validate_syntax`: check the source structurally, without executing it
//!
//! Neither operation can fail at the contract level; all failure modes are
//! folded into the returned result's status/error fields. The dispatcher is
//! a pure match over the closed language set.

pub mod c;
pub mod javascript;
pub mod python;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ExecError;
use crate::runner::{RunOutcome, RunStatus};
use crate::trace::{
    split_output_lines, ExecutionResult, ExecutionStatus, ExecutionStep, Language, StackFrame,
    ValidationResult,
};

/// Smallest accepted per-request timeout, in seconds
pub const MIN_TIMEOUT_SECS: u64 = 1;
/// Largest accepted per-request timeout, in seconds
pub const MAX_TIMEOUT_SECS: u64 = 60;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Deadline for syntax checks; independent of the execution timeout since a
/// parse/dry-run compile of a short program is expected to be fast.
pub(crate) const VALIDATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Request to execute a program with tracing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub code: String,
    pub language: Language,
    #[serde(default)]
    pub input_data: Option<String>,
    /// Timeout in seconds; clamped to [MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS]
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl ExecutionRequest {
    /// The enforced wall-clock bound for this request
    pub fn effective_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS))
    }
}

/// Request to validate a program's syntax
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub code: String,
    pub language: Language,
}

/// Uniform contract over the per-language execution strategies
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run the program and capture an ordered trace. Returns within `timeout`
    /// with `steps` non-empty whenever any forward progress occurred; at
    /// minimum one step is present even on immediate failure, carrying the
    /// error.
    async fn execute_with_trace(
        &self,
        code: &str,
        input_data: Option<&str>,
        timeout: Duration,
    ) -> ExecutionResult;

    /// Check the source for structural errors without executing it. A program
    /// that parses but would fail at runtime is still valid.
    async fn validate_syntax(&self, code: &str) -> ValidationResult;
}

static PYTHON_EXECUTOR: python::PythonExecutor = python::PythonExecutor;
static JAVASCRIPT_EXECUTOR: javascript::JavascriptExecutor = javascript::JavascriptExecutor;
static C_EXECUTOR: c::CExecutor = c::CExecutor;

/// Look up the executor for a declared language
pub fn executor_for(language: Language) -> &'static dyn Executor {
    match language {
        Language::Python => &PYTHON_EXECUTOR,
        Language::Javascript => &JAVASCRIPT_EXECUTOR,
        Language::C => &C_EXECUTOR,
    }
}

/// Build the single coarse-grained step the process-isolated strategies
/// produce. No line-level granularity exists for an opaque child process, so
/// the whole run collapses into `line=1, step=0` with a synthetic "main"
/// frame.
///
/// Non-empty stderr is treated as authoritative over the exit code: a process
/// that exits 0 but wrote to stderr is still classified as an error. This
/// misclassifies warnings-to-stderr from well-behaved programs; downstream
/// consumers depend on the behavior, so it is kept as-is.
pub(crate) fn coarse_result(
    outcome: &RunOutcome,
    timeout: Duration,
    execution_time: f64,
) -> ExecutionResult {
    let output = split_output_lines(&outcome.stdout);

    let error = match &outcome.status {
        RunStatus::TimedOut => Some(ExecError::Timeout(timeout.as_secs()).to_string()),
        RunStatus::Exited(_) if !outcome.stderr.is_empty() => Some(outcome.stderr.clone()),
        RunStatus::Exited(0) => None,
        RunStatus::Exited(code) => Some(format!("process exited with code {}", code)),
    };

    let status = if error.is_some() {
        ExecutionStatus::Error
    } else {
        ExecutionStatus::Completed
    };

    let step = ExecutionStep {
        line: 1,
        step: 0,
        stack: vec![StackFrame::entry_point()],
        output: output.clone(),
        error: error.clone(),
    };

    ExecutionResult {
        steps: vec![step],
        output,
        status,
        execution_time,
        error,
    }
}
