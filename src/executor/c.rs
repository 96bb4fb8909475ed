//! Compile-then-run executor for C (gcc)
//!
//! Two phases against one shared deadline: the compile phase is deducted
//! from the run budget, so the whole call still returns within the request
//! timeout. A failed compile short-circuits with the compiler's diagnostic
//! verbatim; no run phase happens. Syntax validation is a dry-run compile
//! (`-fsyntax-only`) that produces no artifact.

use async_trait::async_trait;
use std::time::{Duration, Instant};

use crate::error::ExecError;
use crate::executor::{coarse_result, Executor, VALIDATE_TIMEOUT};
use crate::languages;
use crate::runner::{run_command, CommandSpec};
use crate::trace::{ExecutionResult, Language, ValidationError, ValidationResult};

pub struct CExecutor;

impl CExecutor {
    async fn compile_and_run(
        &self,
        code: &str,
        input_data: Option<&str>,
        timeout: Duration,
    ) -> Result<ExecutionResult, ExecError> {
        let config = languages::get_language_config(Language::C)
            .ok_or_else(|| ExecError::Internal("c language configuration missing".into()))?;
        let compile_command = config
            .compile_command
            .as_ref()
            .ok_or_else(|| ExecError::Internal("c compile command missing".into()))?;

        let work_dir = tempfile::tempdir()?;
        std::fs::write(work_dir.path().join(&config.source_file), code)?;

        let started = Instant::now();

        let compile_cmd = CommandSpec::from_vec(compile_command).with_work_dir(work_dir.path());
        let compiled = run_command(&compile_cmd, None, timeout).await?;
        if compiled.timed_out() {
            return Err(ExecError::Timeout(timeout.as_secs()));
        }
        if !compiled.is_success() {
            let diagnostic = if compiled.stderr.is_empty() {
                compiled.stdout
            } else {
                compiled.stderr
            };
            return Err(ExecError::Compile(diagnostic));
        }

        let remaining = timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Err(ExecError::Timeout(timeout.as_secs()));
        }

        let run_cmd = CommandSpec::from_vec(&config.run_command).with_work_dir(work_dir.path());
        let outcome = run_command(&run_cmd, input_data, remaining).await?;

        Ok(coarse_result(&outcome, timeout, 0.0))
    }

    async fn check_syntax(&self, code: &str) -> Result<ValidationResult, ExecError> {
        let config = languages::get_language_config(Language::C)
            .ok_or_else(|| ExecError::Internal("c language configuration missing".into()))?;

        let work_dir = tempfile::tempdir()?;
        std::fs::write(work_dir.path().join(&config.source_file), code)?;

        let cmd = CommandSpec::from_vec(&config.check_command).with_work_dir(work_dir.path());
        let outcome = run_command(&cmd, None, VALIDATE_TIMEOUT).await?;
        if outcome.timed_out() {
            return Err(ExecError::Timeout(VALIDATE_TIMEOUT.as_secs()));
        }

        if outcome.is_success() {
            Ok(ValidationResult::valid())
        } else {
            // Compiler diagnostics are free text; positions default to 1,1.
            Ok(ValidationResult::invalid(vec![ValidationError::new(
                1,
                1,
                outcome.stderr.trim().to_string(),
                "CompileError",
            )]))
        }
    }
}

#[async_trait]
impl Executor for CExecutor {
    async fn execute_with_trace(
        &self,
        code: &str,
        input_data: Option<&str>,
        timeout: Duration,
    ) -> ExecutionResult {
        let started = Instant::now();
        match self.compile_and_run(code, input_data, timeout).await {
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
