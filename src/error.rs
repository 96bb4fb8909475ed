//! Error taxonomy for execution and validation
//!
//! These errors never reach the caller as a fault: every executor folds them
//! into the `status`/`error` fields of its result. The variants exist so the
//! three language paths classify failures uniformly.

use thiserror::Error;

/// Classified failure of a single execution or validation call
#[derive(Debug, Error)]
pub enum ExecError {
    /// Toolchain rejected the source; carries the compiler diagnostic verbatim
    #[error("{0}")]
    Compile(String),
    /// Parser or runtime rejected the source before execution
    #[error("{0}")]
    Syntax(String),
    /// Wall-clock bound exceeded
    #[error("execution timed out after {0} seconds")]
    Timeout(u64),
    /// Program crashed, exited abnormally, or wrote to stderr
    #[error("{0}")]
    Runtime(String),
    /// Harness/tracer failure unrelated to the submitted program
    #[error("internal error: {0}")]
    Internal(String),
}

impl ExecError {
    pub fn internal(err: impl std::fmt::Display) -> Self {
        ExecError::Internal(err.to_string())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecError::Timeout(_))
    }
}

impl From<anyhow::Error> for ExecError {
    fn from(err: anyhow::Error) -> Self {
        ExecError::Internal(format!("{:#}", err))
    }
}

impl From<std::io::Error> for ExecError {
    fn from(err: std::io::Error) -> Self {
        ExecError::Internal(err.to_string())
    }
}
