//! Process-isolated executor for JavaScript (Node.js)
//!
//! The runtime is an opaque child process, so no line-level trace is
//! available; the whole run collapses into one coarse-grained step. Syntax
//! validation goes through a probe script that constructs the source as a
//! function body without invoking it.

use async_trait::async_trait;
use std::time::{Duration, Instant};

use crate::error::ExecError;
use crate::executor::{coarse_result, Executor, VALIDATE_TIMEOUT};
use crate::languages;
use crate::runner::{run_command, CommandSpec};
use crate::trace::{ExecutionResult, Language, ValidationError, ValidationResult};

const CHECK_FILE: &str = "check_syntax.js";

const SYNTAX_OK_TOKEN: &str = "SYNTAX_OK";
const SYNTAX_ERROR_TOKEN: &str = "SYNTAX_ERROR:";

pub struct JavascriptExecutor;

impl JavascriptExecutor {
    async fn run_isolated(
        &self,
        code: &str,
        input_data: Option<&str>,
        timeout: Duration,
    ) -> Result<ExecutionResult, ExecError> {
        let config = languages::get_language_config(Language::Javascript).ok_or_else(|| {
            ExecError::Internal("javascript language configuration missing".into())
        })?;

        let work_dir = tempfile::tempdir()?;
        std::fs::write(work_dir.path().join(&config.source_file), code)?;

        let cmd = CommandSpec::from_vec(&config.run_command).with_work_dir(work_dir.path());
        let outcome = run_command(&cmd, input_data, timeout).await?;

        Ok(coarse_result(&outcome, timeout, 0.0))
    }

    async fn check_syntax(&self, code: &str) -> Result<ValidationResult, ExecError> {
        let config = languages::get_language_config(Language::Javascript).ok_or_else(|| {
            ExecError::Internal("javascript language configuration missing".into())
        })?;

        let work_dir = tempfile::tempdir()?;
        std::fs::write(work_dir.path().join(CHECK_FILE), probe_script(code)?)?;

        let cmd = CommandSpec::from_vec(&config.check_command).with_work_dir(work_dir.path());
        let outcome = run_command(&cmd, None, VALIDATE_TIMEOUT).await?;
        if outcome.timed_out() {
            return Err(ExecError::Timeout(VALIDATE_TIMEOUT.as_secs()));
        }

        let first_line = outcome.stdout.lines().next().unwrap_or("").trim();
        if first_line.starts_with(SYNTAX_OK_TOKEN) {
            return Ok(ValidationResult::valid());
        }

        // Absence of the success token is a failed check, whatever the cause.
        let message = match first_line.strip_prefix(SYNTAX_ERROR_TOKEN) {
            Some(msg) if !msg.trim().is_empty() => msg.trim().to_string(),
            _ if !outcome.stderr.trim().is_empty() => outcome.stderr.trim().to_string(),
            _ => "syntax check failed".to_string(),
        };
        Ok(ValidationResult::invalid(vec![ValidationError::new(
            1,
            1,
            message,
            "SyntaxError",
        )]))
    }
}

/// Probe that constructs the submitted source as a callable body without
/// invoking it, then reports a fixed token either way.
fn probe_script(code: &str) -> Result<String, ExecError> {
    let encoded = serde_json::to_string(code)
        .map_err(|err| ExecError::Internal(format!("failed to encode source: {}", err)))?;
    Ok(format!(
        "try {{\n    new Function({});\n    console.log(\"{}\");\n}} catch (e) {{\n    console.log(\"{}\" + e.message);\n}}\n",
        encoded, SYNTAX_OK_TOKEN, SYNTAX_ERROR_TOKEN
    ))
}

#[async_trait]
impl Executor for JavascriptExecutor {
    async fn execute_with_trace(
        &self,
        code: &str,
        input_data: Option<&str>,
        timeout: Duration,
    ) -> ExecutionResult {
        let started = Instant::now();
        match self.run_isolated(code, input_data, timeout).await {
            Ok(mut result) => {
                result.execution_time = started.elapsed().as_secs_f64();
                result
            }
            Err(err) => ExecutionResult::failed(&err, Vec::new(), started.elapsed().as_secs_f64()),
        }
    }

    async fn validate_syntax(&self, code: &str) -> ValidationResult {
        match self.check_syntax(code).await {
            Ok(result) => result,
            Err(err) => ValidationResult::invalid(vec![ValidationError::new(
                1,
                1,
                err.to_string(),
                "InternalError",
            )]),
        }
    }
}
