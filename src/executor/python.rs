//! Introspective executor for Python
//!
//! The fine-grained strategy: the user program runs under an embedded Python
//! harness (`files/trace_harness.py`) in a child process. The harness hooks
//! `sys.settrace` and reports one JSON event per line/call/return on its
//! stdout; this side parses the event stream into `ExecutionStep`s.
//!
//! Running the tracer out-of-process rather than hooking the host interpreter
//! keeps the request timeout enforceable on this path: an infinite loop in
//! the traced program is killed like any other child. This provides
//! debuggability, not security isolation.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::ExecError;
use crate::executor::{Executor, VALIDATE_TIMEOUT};
use crate::format::format_value;
use crate::languages;
use crate::runner::{run_command, CommandSpec, RunOutcome, RunStatus};
use crate::trace::{
    completed_output_lines, split_output_lines, ExecutionResult, ExecutionStatus, ExecutionStep,
    Language, Scope, StackFrame, ValidationError, ValidationResult, Variable,
};

const TRACE_HARNESS: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/files/trace_harness.py"));
const CHECK_SYNTAX: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/files/check_syntax.py"));

const HARNESS_FILE: &str = "trace_harness.py";
const CHECK_FILE: &str = "check_syntax.py";

/// One name/value binding as reported by the harness
#[derive(Debug, Deserialize)]
struct RawBinding {
    name: String,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(rename = "type", default)]
    type_name: String,
}

/// One line of the harness event protocol
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum HarnessEvent {
    Step {
        line: u32,
        function: String,
        #[serde(default)]
        locals: Vec<RawBinding>,
        #[serde(default)]
        globals: Vec<RawBinding>,
        #[serde(default)]
        output: String,
    },
    Skipped,
    Done {
        status: String,
        #[serde(default)]
        output: String,
        error: Option<String>,
    },
}

/// Builds the step sequence from the harness event stream.
///
/// Step numbers are assigned here as events arrive, so a skipped or
/// malformed event never leaves a gap in the sequence. Skips are counted
/// rather than silently discarded.
#[derive(Debug, Default)]
struct TraceCollector {
    steps: Vec<ExecutionStep>,
    skipped: usize,
    done: Option<(ExecutionStatus, Vec<String>, Option<String>)>,
}

impl TraceCollector {
    fn push_line(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        match serde_json::from_str::<HarnessEvent>(line) {
            Ok(HarnessEvent::Step {
                line,
                function,
                locals,
                globals,
                output,
            }) => self.push_step(line, function, locals, globals, &output),
            Ok(HarnessEvent::Skipped) => self.skipped += 1,
            Ok(HarnessEvent::Done {
                status,
                output,
                error,
            }) => {
                let status = if status == "completed" {
                    ExecutionStatus::Completed
                } else {
                    ExecutionStatus::Error
                };
                self.done = Some((status, split_output_lines(&output), error));
            }
            Err(err) => {
                debug!("Discarding malformed trace event: {}", err);
                self.skipped += 1;
            }
        }
    }

    fn push_step(
        &mut self,
        line: u32,
        function: String,
        locals: Vec<RawBinding>,
        globals: Vec<RawBinding>,
        output: &str,
    ) {
        let frame = StackFrame {
            function_name: function,
            line,
            locals: convert_bindings(locals, Scope::Local),
            globals: convert_bindings(globals, Scope::Global),
        };
        // Completed lines only: a partial write ("ab" before "c\n" lands)
        // must not surface as a line an adjacent step then rewrites, or the
        // per-step output would stop being prefix-monotonic.
        let step = ExecutionStep {
            line,
            step: self.steps.len() as u32,
            stack: vec![frame],
            output: completed_output_lines(output),
            error: None,
        };
        self.steps.push(step);
    }

    fn skipped(&self) -> usize {
        self.skipped
    }

    /// Fold the collected events and the raw process outcome into a result.
    /// Partial traces are preserved on timeout and on harness death; a
    /// synthetic error step is appended only when nothing was captured.
    fn into_result(self, outcome: &RunOutcome, timeout: Duration) -> ExecutionResult {
        let TraceCollector {
            mut steps, done, ..
        } = self;

        let (status, output, error) = match (&outcome.status, done) {
            (RunStatus::TimedOut, _) => {
                let message = ExecError::Timeout(timeout.as_secs()).to_string();
                let output = steps.last().map(|s| s.output.clone()).unwrap_or_default();
                (ExecutionStatus::Error, output, Some(message))
            }
            (RunStatus::Exited(_), Some((status, output, error))) => (status, output, error),
            (RunStatus::Exited(_), None) => {
                // The harness died before reporting a final event.
                let message = if outcome.stderr.trim().is_empty() {
                    "tracer terminated unexpectedly".to_string()
                } else {
                    outcome.stderr.trim().to_string()
                };
                let output = steps.last().map(|s| s.output.clone()).unwrap_or_default();
                (ExecutionStatus::Error, output, Some(message))
            }
        };

        if steps.is_empty() {
            steps.push(ExecutionStep {
                line: 1,
                step: 0,
                stack: Vec::new(),
                output: output.clone(),
                error: error.clone(),
            });
        }

        ExecutionResult {
            steps,
            output,
            status,
            execution_time: 0.0,
            error,
        }
    }
}

fn convert_bindings(raw: Vec<RawBinding>, scope: Scope) -> Vec<Variable> {
    raw.into_iter()
        .map(|binding| Variable {
            name: binding.name,
            value: format_value(&binding.value),
            type_name: binding.type_name,
            scope,
        })
        .collect()
}

/// Verdict printed by the check_syntax helper
#[derive(Debug, Deserialize)]
struct CheckVerdict {
    ok: bool,
    #[serde(default = "default_position")]
    line: u32,
    #[serde(default = "default_position")]
    column: u32,
    #[serde(default)]
    message: String,
    #[serde(rename = "type", default)]
    kind: String,
}

fn default_position() -> u32 {
    1
}

pub struct PythonExecutor;

impl PythonExecutor {
    async fn run_traced(
        &self,
        code: &str,
        input_data: Option<&str>,
        timeout: Duration,
    ) -> Result<ExecutionResult, ExecError> {
        let config = languages::get_language_config(Language::Python)
            .ok_or_else(|| ExecError::Internal("python language configuration missing".into()))?;

        let work_dir = tempfile::tempdir()?;
        std::fs::write(work_dir.path().join(&config.source_file), code)?;
        std::fs::write(work_dir.path().join(HARNESS_FILE), TRACE_HARNESS)?;

        let cmd = CommandSpec::from_vec(&config.run_command).with_work_dir(work_dir.path());
        let outcome = run_command(&cmd, input_data, timeout).await?;

        let mut collector = TraceCollector::default();
        for line in outcome.stdout.lines() {
            collector.push_line(line);
        }
        if collector.skipped() > 0 {
            debug!("Trace dropped {} uncapturable steps", collector.skipped());
        }

        Ok(collector.into_result(&outcome, timeout))
    }

    async fn check_syntax(&self, code: &str) -> Result<ValidationResult, ExecError> {
        let config = languages::get_language_config(Language::Python)
            .ok_or_else(|| ExecError::Internal("python language configuration missing".into()))?;

        let work_dir = tempfile::tempdir()?;
        std::fs::write(work_dir.path().join(&config.source_file), code)?;
        std::fs::write(work_dir.path().join(CHECK_FILE), CHECK_SYNTAX)?;

        let cmd = CommandSpec::from_vec(&config.check_command).with_work_dir(work_dir.path());
        let outcome = run_command(&cmd, None, VALIDATE_TIMEOUT).await?;
        if outcome.timed_out() {
            return Err(ExecError::Timeout(VALIDATE_TIMEOUT.as_secs()));
        }

        let verdict_line = outcome
            .stdout
            .lines()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| {
                let detail = if outcome.stderr.trim().is_empty() {
                    "syntax checker produced no verdict".to_string()
                } else {
                    outcome.stderr.trim().to_string()
                };
                ExecError::Internal(detail)
            })?;

        let verdict: CheckVerdict = serde_json::from_str(verdict_line)
            .map_err(|err| ExecError::Internal(format!("unreadable syntax verdict: {}", err)))?;

        if verdict.ok {
            Ok(ValidationResult::valid())
        } else {
            let kind = if verdict.kind.is_empty() {
                "SyntaxError".to_string()
            } else {
                verdict.kind
            };
            Ok(ValidationResult::invalid(vec![ValidationError::new(
                verdict.line,
                verdict.column,
                verdict.message,
                kind,
            )]))
        }
    }
}

#[async_trait]
impl Executor for PythonExecutor {
    async fn execute_with_trace(
        &self,
        code: &str,
        input_data: Option<&str>,
        timeout: Duration,
    ) -> ExecutionResult {
        let started = Instant::now();
        match self.run_traced(code, input_data, timeout).await {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::tool_available;
    use crate::trace::FormattedValue;

    fn step_line(line: u32, output: &str) -> String {
        format!(
            r#"{{"event": "step", "line": {}, "function": "<module>", "locals": [{{"name": "x", "value": 1, "type": "int"}}], "globals": [], "output": "{}"}}"#,
            line, output
        )
    }

    #[test]
    fn collector_assigns_dense_step_numbers() {
        let mut collector = TraceCollector::default();
        collector.push_line(&step_line(1, ""));
        collector.push_line("not json at all");
        collector.push_line(r#"{"event": "skipped"}"#);
        collector.push_line(&step_line(2, "hi\\n"));

        assert_eq!(collector.skipped(), 2);
        assert_eq!(collector.steps.len(), 2);
        let numbers: Vec<u32> = collector.steps.iter().map(|s| s.step).collect();
        assert_eq!(numbers, vec![0, 1]);
        assert_eq!(collector.steps[1].output, vec!["hi"]);
    }

    #[test]
    fn collector_formats_captured_bindings() {
        let mut collector = TraceCollector::default();
        collector.push_line(&step_line(3, ""));
        let frame = &collector.steps[0].stack[0];
        assert_eq!(frame.function_name, "<module>");
        assert_eq!(frame.locals.len(), 1);
        let var = &frame.locals[0];
        assert_eq!(var.name, "x");
        assert_eq!(var.value, FormattedValue::Int(1));
        assert_eq!(var.type_name, "int");
        assert_eq!(var.scope, Scope::Local);
    }

    #[test]
    fn partial_lines_are_held_back_until_terminated() {
        let mut collector = TraceCollector::default();
        collector.push_line(&step_line(1, "ab"));
        collector.push_line(&step_line(2, "abc\\n"));
        collector.push_line(&step_line(3, "abc\\nx"));

        assert!(collector.steps[0].output.is_empty());
        assert_eq!(collector.steps[1].output, vec!["abc"]);
        assert_eq!(collector.steps[2].output, vec!["abc"]);
        for pair in collector.steps.windows(2) {
            assert!(pair[1].output.starts_with(pair[0].output.as_slice()));
        }
    }

    #[test]
    fn done_event_drives_status_and_final_output() {
        let mut collector = TraceCollector::default();
        collector.push_line(&step_line(1, ""));
        collector
            .push_line(r#"{"event": "done", "status": "completed", "output": "3\n", "error": null}"#);
        let outcome = RunOutcome {
            status: RunStatus::Exited(0),
            stdout: String::new(),
            stderr: String::new(),
        };
        let result = collector.into_result(&outcome, Duration::from_secs(5));
        assert_eq!(result.status, ExecutionStatus::Completed);
        assert_eq!(result.output, vec!["3"]);
        assert!(result.error.is_none());
        assert_eq!(result.steps.len(), 1);
    }

    #[test]
    fn missing_done_event_is_an_error_but_keeps_partial_steps() {
        let mut collector = TraceCollector::default();
        collector.push_line(&step_line(1, "partial\\n"));
        let outcome = RunOutcome {
            status: RunStatus::Exited(1),
            stdout: String::new(),
            stderr: "Segmentation fault".into(),
        };
        let result = collector.into_result(&outcome, Duration::from_secs(5));
        assert_eq!(result.status, ExecutionStatus::Error);
        assert_eq!(result.error.as_deref(), Some("Segmentation fault"));
        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.output, vec!["partial"]);
    }

    #[test]
    fn timeout_preserves_the_partial_trace() {
        let mut collector = TraceCollector::default();
        collector.push_line(&step_line(1, ""));
        collector.push_line(&step_line(2, "tick\\n"));
        let outcome = RunOutcome {
            status: RunStatus::TimedOut,
            stdout: String::new(),
            stderr: String::new(),
        };
        let result = collector.into_result(&outcome, Duration::from_secs(1));
        assert_eq!(result.status, ExecutionStatus::Error);
        assert!(result.error.as_deref().unwrap().contains("timed out"));
        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.output, vec!["tick"]);
    }

    #[test]
    fn empty_trace_gets_one_synthetic_error_step() {
        let collector = TraceCollector::default();
        let outcome = RunOutcome {
            status: RunStatus::Exited(1),
            stdout: String::new(),
            stderr: "boom".into(),
        };
        let result = collector.into_result(&outcome, Duration::from_secs(5));
        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.steps[0].step, 0);
        assert_eq!(result.steps[0].error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn traces_a_three_line_program() {
        if !tool_available("python3") {
            return;
        }
        let result = PythonExecutor
            .execute_with_trace("x = 1\ny = 2\nprint(x + y)\n", None, Duration::from_secs(10))
            .await;

        assert_eq!(result.status, ExecutionStatus::Completed);
        assert!(result.steps.len() >= 3, "got {} steps", result.steps.len());
        assert_eq!(result.output, vec!["3"]);

        // Dense 0-based step numbering
        for (i, step) in result.steps.iter().enumerate() {
            assert_eq!(step.step, i as u32);
        }

        // Output monotonicity: each step's output extends the previous one
        for pair in result.steps.windows(2) {
            let (earlier, later) = (&pair[0].output, &pair[1].output);
            assert!(later.starts_with(earlier.as_slice()));
        }

        // x = 1 must have been captured somewhere in the trace
        let saw_x = result.steps.iter().any(|step| {
            step.stack.iter().any(|frame| {
                frame
                    .locals
                    .iter()
                    .chain(frame.globals.iter())
                    .any(|v| v.name == "x" && v.value == FormattedValue::Int(1))
            })
        });
        assert!(saw_x, "no step captured x = 1");
    }

    #[tokio::test]
    async fn unbuffered_partial_writes_stay_prefix_monotonic() {
        if !tool_available("python3") {
            return;
        }
        let code = "import sys\nsys.stdout.write('ab')\nsys.stdout.write('c\\n')\n";
        let result = PythonExecutor
            .execute_with_trace(code, None, Duration::from_secs(10))
            .await;
        assert_eq!(result.status, ExecutionStatus::Completed);
        assert_eq!(result.output, vec!["abc"]);
        for pair in result.steps.windows(2) {
            assert!(pair[1].output.starts_with(pair[0].output.as_slice()));
        }
    }

    #[tokio::test]
    async fn traces_function_calls() {
        if !tool_available("python3") {
            return;
        }
        let code = "def double(n):\n    return n * 2\n\nprint(double(21))\n";
        let result = PythonExecutor
            .execute_with_trace(code, None, Duration::from_secs(10))
            .await;
        assert_eq!(result.status, ExecutionStatus::Completed);
        assert_eq!(result.output, vec!["42"]);
        assert!(result
            .steps
            .iter()
            .any(|s| s.stack.first().map(|f| f.function_name.as_str()) == Some("double")));
    }

    #[tokio::test]
    async fn feeds_input_data_to_the_program() {
        if !tool_available("python3") {
            return;
        }
        let result = PythonExecutor
            .execute_with_trace("print(input())\n", Some("hello"), Duration::from_secs(10))
            .await;
        assert_eq!(result.status, ExecutionStatus::Completed);
        assert_eq!(result.output, vec!["hello"]);
    }

    #[tokio::test]
    async fn runtime_errors_surface_in_the_result() {
        if !tool_available("python3") {
            return;
        }
        let result = PythonExecutor
            .execute_with_trace("x = 1\nraise ValueError('nope')\n", None, Duration::from_secs(10))
            .await;
        assert_eq!(result.status, ExecutionStatus::Error);
        assert!(result.error.as_deref().unwrap().contains("nope"));
        // The lines before the raise were still traced
        assert!(!result.steps.is_empty());
    }

    #[tokio::test]
    async fn infinite_loop_is_killed_at_the_deadline() {
        if !tool_available("python3") {
            return;
        }
        let started = Instant::now();
        let result = PythonExecutor
            .execute_with_trace("while True:\n    pass\n", None, Duration::from_secs(1))
            .await;
        assert_eq!(result.status, ExecutionStatus::Error);
        assert!(result.error.as_deref().unwrap().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn syntax_error_fails_both_operations() {
        if !tool_available("python3") {
            return;
        }
        let broken = "def f(:\n    pass\n";

        let validation = PythonExecutor.validate_syntax(broken).await;
        assert!(!validation.is_valid);
        assert_eq!(validation.errors.len(), 1);
        assert_eq!(validation.errors[0].type_name, "SyntaxError");
        assert!(validation.errors[0].line >= 1);

        let result = PythonExecutor
            .execute_with_trace(broken, None, Duration::from_secs(10))
            .await;
        assert_eq!(result.status, ExecutionStatus::Error);
        assert!(!result.steps.is_empty());
    }

    #[tokio::test]
    async fn valid_code_passes_validation_without_side_effects() {
        if !tool_available("python3") {
            return;
        }
        // Would print if executed; validation must not run it
        let validation = PythonExecutor.validate_syntax("print('should not appear')\n").await;
        assert!(validation.is_valid);
        assert!(validation.errors.is_empty());
    }
}
