//! Shared trace data model
//!
//! These are the shapes every executor produces and every consumer (the API
//! layer, the visualizer) understands. Everything here is created fresh per
//! request and discarded once the caller has consumed it; nothing is cached
//! or shared across concurrent requests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ExecError;

/// Supported languages. The wire names are the lowercase enum names; an
/// unknown name is rejected when the request is deserialized, before any
/// executor is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    C,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::C => "c",
        }
    }

    /// All supported languages, in dispatch order
    pub fn all() -> [Language; 3] {
        [Language::Python, Language::Javascript, Language::C]
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final status of an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Error,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Whether a variable was captured from the local or the enclosing global scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Local,
    Global,
}

/// A captured runtime value: scalar, bounded sequence, bounded mapping, or a
/// display string for anything else.
///
/// Serializes untagged, so the JSON wire shape is a plain JSON value. Mapping
/// entries are keyed by a sorted map; original key order is not preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormattedValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Sequence(Vec<FormattedValue>),
    Mapping(BTreeMap<String, FormattedValue>),
}

/// Immutable snapshot of one binding at one captured step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub value: FormattedValue,
    #[serde(rename = "type")]
    pub type_name: String,
    pub scope: Scope,
}

/// One call-stack level at one instant.
///
/// `locals` and `globals` are insertion-ordered and name-unique at capture
/// time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackFrame {
    pub function_name: String,
    pub line: u32,
    pub locals: Vec<Variable>,
    pub globals: Vec<Variable>,
}

impl StackFrame {
    /// Synthetic frame for coarse-grained (process-isolated) execution, which
    /// has no introspection into the child's call stack.
    pub fn entry_point() -> Self {
        StackFrame {
            function_name: "main".into(),
            line: 1,
            locals: Vec::new(),
            globals: Vec::new(),
        }
    }
}

/// One captured snapshot of program counter, call stack, and accumulated
/// output.
///
/// `step` values form a dense 0-based sequence within a trace. `stack` is
/// ordered innermost-last; the current implementation captures only the
/// innermost frame, so in practice it holds a single entry. `output` holds
/// every line produced so far, so a later step's output extends an earlier
/// one by suffix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub line: u32,
    pub step: u32,
    pub stack: Vec<StackFrame>,
    pub output: Vec<String>,
    pub error: Option<String>,
}

impl ExecutionStep {
    /// Single step standing in for an execution that failed before any step
    /// could be captured.
    pub fn synthetic_error(message: impl Into<String>) -> Self {
        ExecutionStep {
            line: 1,
            step: 0,
            stack: Vec::new(),
            output: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// Complete outcome of one `execute_with_trace` call. Owned by that call;
/// never shared across requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub steps: Vec<ExecutionStep>,
    pub output: Vec<String>,
    pub status: ExecutionStatus,
    pub execution_time: f64,
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Result for an execution that aborted as a whole. Appends a synthetic
    /// step carrying the error only when no step was captured, so partial
    /// traces are preserved.
    pub fn failed(error: &ExecError, mut steps: Vec<ExecutionStep>, execution_time: f64) -> Self {
        let message = error.to_string();
        let output = steps.last().map(|s| s.output.clone()).unwrap_or_default();
        if steps.is_empty() {
            steps.push(ExecutionStep::synthetic_error(&message));
        }
        ExecutionResult {
            steps,
            output,
            status: ExecutionStatus::Error,
            execution_time,
            error: Some(message),
        }
    }
}

/// Split an accumulated output buffer into its completed lines, holding back
/// the trailing segment that is not yet newline-terminated. A terminated line
/// never changes as the buffer grows, so per-step output built this way stays
/// prefix-monotonic even when the program writes partial lines.
pub fn completed_output_lines(raw: &str) -> Vec<String> {
    let mut lines: Vec<String> = raw.split('\n').map(|s| s.to_string()).collect();
    // The segment after the last newline: unterminated text, or empty when
    // the buffer ends in a newline. Either way it is not a completed line.
    lines.pop();
    lines
}

/// Split captured stdout into the trace model's line-oriented output shape.
/// Empty output maps to an empty sequence, not a single empty line.
pub fn split_output_lines(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.split('\n').map(|s| s.to_string()).collect()
}

/// One structural problem found by syntax validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub line: u32,
    pub column: u32,
    pub message: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

impl ValidationError {
    pub fn new(line: u32, column: u32, message: impl Into<String>, kind: impl Into<String>) -> Self {
        ValidationError {
            line,
            column,
            message: message.into(),
            type_name: kind.into(),
        }
    }
}

/// Outcome of a syntax check. `is_valid == errors.is_empty()` always holds;
/// warnings do not affect validity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        ValidationResult {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<ValidationError>) -> Self {
        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_wire_names_are_lowercase() {
        for lang in Language::all() {
            let json = serde_json::to_string(&lang).unwrap();
            assert_eq!(json, format!("\"{}\"", lang.as_str()));
        }
        let parsed: Language = serde_json::from_str("\"javascript\"").unwrap();
        assert_eq!(parsed, Language::Javascript);
        assert!(serde_json::from_str::<Language>("\"ruby\"").is_err());
    }

    #[test]
    fn variable_serializes_with_type_key() {
        let var = Variable {
            name: "x".into(),
            value: FormattedValue::Int(1),
            type_name: "int".into(),
            scope: Scope::Local,
        };
        let json = serde_json::to_value(&var).unwrap();
        assert_eq!(json["type"], "int");
        assert_eq!(json["value"], 1);
        assert_eq!(json["scope"], "local");
    }

    #[test]
    fn formatted_value_round_trips_untagged() {
        let value = FormattedValue::Sequence(vec![
            FormattedValue::Int(1),
            FormattedValue::Text("two".into()),
            FormattedValue::Null,
        ]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "[1,\"two\",null]");
        let back: FormattedValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn failed_result_synthesizes_a_step_only_when_empty() {
        let err = ExecError::Runtime("boom".into());
        let result = ExecutionResult::failed(&err, Vec::new(), 0.1);
        assert_eq!(result.status, ExecutionStatus::Error);
        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.steps[0].error.as_deref(), Some("boom"));

        let partial = vec![ExecutionStep {
            line: 2,
            step: 0,
            stack: Vec::new(),
            output: vec!["hi".into()],
            error: None,
        }];
        let result = ExecutionResult::failed(&err, partial, 0.1);
        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.steps[0].line, 2);
        assert_eq!(result.output, vec!["hi".to_string()]);
    }

    #[test]
    fn split_output_handles_empty_and_trailing_newlines() {
        assert!(split_output_lines("").is_empty());
        assert!(split_output_lines("\n\n").is_empty());
        assert_eq!(split_output_lines("a\nb\n"), vec!["a", "b"]);
        assert_eq!(split_output_lines("hello\n"), vec!["hello"]);
    }

    #[test]
    fn completed_lines_hold_back_the_unterminated_tail() {
        assert!(completed_output_lines("").is_empty());
        assert!(completed_output_lines("ab").is_empty());
        assert_eq!(completed_output_lines("abc\n"), vec!["abc"]);
        assert_eq!(completed_output_lines("a\nb"), vec!["a"]);
        assert_eq!(completed_output_lines("a\nb\n"), vec!["a", "b"]);
    }

    #[test]
    fn validation_invariant_holds() {
        assert!(ValidationResult::valid().is_valid);
        let invalid = ValidationResult::invalid(vec![ValidationError::new(
            3,
            7,
            "unexpected token",
            "SyntaxError",
        )]);
        assert!(!invalid.is_valid);
        assert_eq!(invalid.errors.len(), 1);
        assert_eq!(invalid.errors[0].line, 3);
        assert!(invalid.warnings.is_empty());
    }
}
