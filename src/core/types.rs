use crate::config::types::OutputIntegrity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// One problem test case, supplied by the caller and never modified.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TestCase {
    /// Argument value or positional argument list; `null` means no arguments
    #[serde(default)]
    pub input: Value,
    pub expected_output: String,
}

impl TestCase {
    pub fn new(input: Value, expected_output: impl Into<String>) -> Self {
        Self {
            input,
            expected_output: expected_output.into(),
        }
    }
}

/// Outcome of running one test case inside the sandbox.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TestResult {
    pub test_case_index: usize,
    pub input: Value,
    pub expected: String,
    pub actual: String,
    pub passed: bool,
    /// Text printed by the submission while this case ran
    pub output_captured: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Violation categories reported by the static analyzer and the watchdog
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ViolationCategory {
    #[serde(rename = "disallowed_import")]
    DisallowedImport,
    #[serde(rename = "disallowed_call")]
    DisallowedCall,
    #[serde(rename = "dunder_access")]
    DunderAccess,
    #[serde(rename = "suspicious_string")]
    SuspiciousString,
    #[serde(rename = "disallowed_pattern")]
    DisallowedPattern,
    #[serde(rename = "timeout")]
    Timeout,
}

impl ViolationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationCategory::DisallowedImport => "disallowed_import",
            ViolationCategory::DisallowedCall => "disallowed_call",
            ViolationCategory::DunderAccess => "dunder_access",
            ViolationCategory::SuspiciousString => "suspicious_string",
            ViolationCategory::DisallowedPattern => "disallowed_pattern",
            ViolationCategory::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ViolationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A flagged construct
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Violation {
    pub category: ViolationCategory,
    pub description: String,
    /// 1-based source line, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Violation {
    pub fn new(category: ViolationCategory, description: impl Into<String>) -> Self {
        Self {
            category,
            description: description.into(),
            line: None,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "[{}] line {}: {}", self.category, line, self.description),
            None => write!(f, "[{}] {}", self.category, self.description),
        }
    }
}

/// Overall judgement
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum VerdictStatus {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
    #[serde(rename = "ERROR")]
    Error,
    #[serde(rename = "TIMEOUT")]
    Timeout,
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictStatus::Pass => write!(f, "PASS"),
            VerdictStatus::Fail => write!(f, "FAIL"),
            VerdictStatus::Error => write!(f, "ERROR"),
            VerdictStatus::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

/// The judge's single return value.
///
/// `result == Pass` only when every test result passed, no violation was
/// recorded and no timeout occurred. A non-empty `security_violations`
/// means the submission was never executed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExecutionVerdict {
    pub run_id: String,
    pub language: String,
    pub result: VerdictStatus,
    pub message: String,
    pub test_results: Vec<TestResult>,
    /// Wall-clock seconds spent in the sandboxed process
    pub execution_time: f64,
    /// Peak resident set size in bytes, when the platform reports it
    pub memory_used: Option<u64>,
    pub security_violations: Vec<Violation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl ExecutionVerdict {
    /// An `ERROR` verdict for a submission that never produced results.
    pub fn error(run_id: &str, language: &str, message: impl Into<String>) -> Self {
        Self {
            run_id: run_id.to_string(),
            language: language.to_string(),
            result: VerdictStatus::Error,
            message: message.into(),
            test_results: Vec::new(),
            execution_time: 0.0,
            memory_used: None,
            security_violations: Vec::new(),
            error_details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.error_details = Some(details.into());
        self
    }

    pub fn passed_count(&self) -> usize {
        self.test_results.iter().filter(|r| r.passed).count()
    }

    pub fn is_pass(&self) -> bool {
        self.result == VerdictStatus::Pass
    }
}

/// Everything the process executor needs to start one sandboxed program.
#[derive(Clone, Debug)]
pub struct LaunchRequest {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Scratch directory used as cwd, HOME and TMPDIR
    pub workdir: PathBuf,
    /// Wall-clock budget; the executor adds its own grace on top
    pub timeout: Duration,
    pub grace: Duration,
    pub memory_limit_bytes: u64,
    pub cpu_limit_secs: u64,
    /// Per-stream capture limit for stdout and stderr
    pub output_limit_bytes: usize,
    /// Largest file the child may write
    pub file_size_limit_bytes: u64,
    pub open_files_limit: u64,
}

/// Process lifecycle states
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running,
    Completed,
    /// Hard deadline reached; the process group was killed
    TimedOut,
    /// Watchdog asked for termination
    Killed,
}

impl ProcessState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessState::Completed | ProcessState::TimedOut | ProcessState::Killed
        )
    }
}

/// Raw evidence from one process execution
#[derive(Clone, Debug)]
pub struct ProcessOutcome {
    pub state: ProcessState,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub stdout_integrity: OutputIntegrity,
    pub stderr_integrity: OutputIntegrity,
    pub wall_time: Duration,
    pub peak_memory_bytes: Option<u64>,
    /// Violation raised by the watchdog, if it ended the run
    pub watchdog_violation: Option<Violation>,
}

impl ProcessOutcome {
    pub fn timed_out(&self) -> bool {
        matches!(self.state, ProcessState::TimedOut | ProcessState::Killed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verdict_status_wire_names() {
        assert_eq!(serde_json::to_value(VerdictStatus::Timeout).unwrap(), json!("TIMEOUT"));
        assert_eq!(
            serde_json::from_value::<VerdictStatus>(json!("PASS")).unwrap(),
            VerdictStatus::Pass
        );
    }

    #[test]
    fn test_test_case_defaults_input() {
        let case: TestCase = serde_json::from_value(json!({"expected_output": "42"})).unwrap();
        assert_eq!(case.input, Value::Null);
        assert_eq!(case.expected_output, "42");
    }

    #[test]
    fn test_violation_display() {
        let v = Violation::new(ViolationCategory::DisallowedImport, "Import of 'os'").at_line(3);
        assert_eq!(v.to_string(), "[disallowed_import] line 3: Import of 'os'");
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["category"], "disallowed_import");
    }

    #[test]
    fn test_error_verdict_shape() {
        let verdict = ExecutionVerdict::error("run", "python", "boom").with_details("Io: x");
        assert_eq!(verdict.result, VerdictStatus::Error);
        assert!(verdict.test_results.is_empty());
        assert_eq!(verdict.error_details.as_deref(), Some("Io: x"));
        assert!(!verdict.is_pass());
    }

    #[test]
    fn test_process_state_terminal() {
        assert!(!ProcessState::Running.is_terminal());
        assert!(ProcessState::Killed.is_terminal());
    }
}
