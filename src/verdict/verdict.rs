/// Verdict classification
///
/// A pure function from the raw evidence of one harness run to the verdict
/// the caller sees. Nothing the harness reports about pass/fail is trusted:
/// results are rebuilt from the caller's own test cases.
use crate::config::types::{Language, OutputIntegrity};
use crate::core::types::{ExecutionVerdict, ProcessOutcome, TestCase, TestResult, VerdictStatus};
use crate::utils::output::truncate_chars;
use crate::verdict::translate::translate;
use serde::Deserialize;

/// Harness exit status when its internal deadline fired
pub const EXIT_DEADLINE: i32 = 124;

/// Raw output kept in `error_details` for diagnostics
pub const MAX_DIAGNOSTIC_CHARS: usize = 500;

/// One record of the harness result list
#[derive(Debug, Clone, Deserialize)]
struct HarnessRecord {
    index: usize,
    #[serde(default)]
    actual: String,
    #[serde(default)]
    output: String,
    #[serde(default)]
    error: Option<String>,
}

/// Verdict classifier - pure function over one process outcome
pub struct VerdictClassifier;

impl VerdictClassifier {
    pub fn classify(
        outcome: &ProcessOutcome,
        cases: &[TestCase],
        run_id: &str,
        language: Language,
    ) -> ExecutionVerdict {
        let mut verdict = ExecutionVerdict::error(run_id, language.as_str(), "");
        verdict.execution_time = outcome.wall_time.as_secs_f64();
        verdict.memory_used = outcome.peak_memory_bytes;

        if Self::is_timeout(outcome) {
            verdict.result = VerdictStatus::Timeout;
            verdict.message = "Time limit exceeded".to_string();
            verdict.error_details = outcome
                .watchdog_violation
                .as_ref()
                .map(|v| v.description.clone());
            return verdict;
        }

        if let Some(signal) = outcome.signal {
            verdict.message = format!("Process terminated by signal {}", signal);
            verdict.error_details = Self::stderr_details(outcome);
            return verdict;
        }

        match outcome.stdout_integrity {
            OutputIntegrity::Complete => {}
            OutputIntegrity::TruncatedByJudgeLimit => {
                verdict.message = "Output limit exceeded".to_string();
                return verdict;
            }
            other => {
                verdict.message = format!("Failed to collect execution output ({})", other);
                verdict.error_details = Self::stderr_details(outcome);
                return verdict;
            }
        }

        match outcome.exit_code {
            Some(0) => {}
            Some(code) => {
                verdict.message = translate(&outcome.stderr, code);
                verdict.error_details = Self::stderr_details(outcome);
                return verdict;
            }
            None => {
                verdict.message = "Process ended without an exit status".to_string();
                return verdict;
            }
        }

        let records = match Self::parse_records(&outcome.stdout, cases.len()) {
            Some(records) => records,
            None => {
                log::warn!("Run {} produced an unreadable result channel", run_id);
                verdict.message = "Failed to parse execution results".to_string();
                verdict.error_details = Some(format!(
                    "stdout: {}\nstderr: {}",
                    truncate_chars(&outcome.stdout, MAX_DIAGNOSTIC_CHARS),
                    truncate_chars(&outcome.stderr, MAX_DIAGNOSTIC_CHARS)
                ));
                return verdict;
            }
        };

        verdict.test_results = cases
            .iter()
            .zip(records)
            .enumerate()
            .map(|(index, (case, record))| build_result(index, case, record))
            .collect();

        let passed = verdict.passed_count();
        let total = verdict.test_results.len();
        verdict.result = if passed == total {
            VerdictStatus::Pass
        } else {
            VerdictStatus::Fail
        };
        verdict.message = format!("{}/{} test cases passed", passed, total);
        verdict
    }

    fn is_timeout(outcome: &ProcessOutcome) -> bool {
        outcome.timed_out()
            || outcome.exit_code == Some(EXIT_DEADLINE)
            || outcome.signal == Some(libc::SIGXCPU)
    }

    fn stderr_details(outcome: &ProcessOutcome) -> Option<String> {
        let stderr = outcome.stderr.trim();
        if stderr.is_empty() {
            None
        } else {
            Some(truncate_chars(stderr, MAX_DIAGNOSTIC_CHARS))
        }
    }

    /// The result list is the last non-empty stdout line. Any shape problem,
    /// including a count or ordering mismatch, rejects the whole channel.
    fn parse_records(stdout: &str, expected: usize) -> Option<Vec<HarnessRecord>> {
        let line = stdout.lines().rev().find(|l| !l.trim().is_empty())?;
        let records: Vec<HarnessRecord> = serde_json::from_str(line.trim()).ok()?;
        if records.len() != expected {
            return None;
        }
        if records.iter().enumerate().any(|(i, r)| r.index != i) {
            return None;
        }
        Some(records)
    }
}

fn build_result(index: usize, case: &TestCase, record: HarnessRecord) -> TestResult {
    let passed =
        record.error.is_none() && record.actual.trim() == case.expected_output.trim();
    TestResult {
        test_case_index: index,
        input: case.input.clone(),
        expected: case.expected_output.clone(),
        actual: record.actual,
        passed,
        output_captured: record.output,
        error: record.error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ProcessState, Violation, ViolationCategory};
    use serde_json::json;
    use std::time::Duration;

    fn outcome(exit_code: Option<i32>, stdout: &str, stderr: &str) -> ProcessOutcome {
        ProcessOutcome {
            state: ProcessState::Completed,
            exit_code,
            signal: None,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            stdout_integrity: OutputIntegrity::Complete,
            stderr_integrity: OutputIntegrity::Complete,
            wall_time: Duration::from_millis(120),
            peak_memory_bytes: Some(9 * 1024 * 1024),
            watchdog_violation: None,
        }
    }

    fn cases() -> Vec<TestCase> {
        vec![
            TestCase::new(json!([1, 2]), "3"),
            TestCase::new(json!([2, 2]), "4"),
        ]
    }

    fn classify(outcome: &ProcessOutcome) -> ExecutionVerdict {
        VerdictClassifier::classify(outcome, &cases(), "run-1", Language::Python)
    }

    #[test]
    fn test_classify_pass() {
        let stdout = "\n[{\"index\":0,\"actual\":\"3\",\"output\":\"\",\"error\":null,\"passed\":true},{\"index\":1,\"actual\":\" 4\\n\",\"output\":\"\",\"error\":null,\"passed\":true}]\n";
        let verdict = classify(&outcome(Some(0), stdout, ""));
        assert_eq!(verdict.result, VerdictStatus::Pass);
        assert_eq!(verdict.message, "2/2 test cases passed");
        assert_eq!(verdict.memory_used, Some(9 * 1024 * 1024));
        assert!(verdict.test_results.iter().all(|r| r.passed));
        assert_eq!(verdict.language, "python");
    }

    #[test]
    fn test_harness_pass_flag_not_trusted() {
        let stdout = "[{\"index\":0,\"actual\":\"3\",\"passed\":true},{\"index\":1,\"actual\":\"5\",\"passed\":true}]";
        let verdict = classify(&outcome(Some(0), stdout, ""));
        assert_eq!(verdict.result, VerdictStatus::Fail);
        assert_eq!(verdict.message, "1/2 test cases passed");
        assert!(!verdict.test_results[1].passed);
        assert_eq!(verdict.test_results[1].expected, "4");
    }

    #[test]
    fn test_case_error_fails_case() {
        let stdout = "[{\"index\":0,\"actual\":\"\",\"error\":\"ZeroDivisionError: division by zero\"},{\"index\":1,\"actual\":\"4\"}]";
        let verdict = classify(&outcome(Some(0), stdout, ""));
        assert_eq!(verdict.result, VerdictStatus::Fail);
        assert_eq!(
            verdict.test_results[0].error.as_deref(),
            Some("ZeroDivisionError: division by zero")
        );
        assert!(verdict.test_results[1].passed);
    }

    #[test]
    fn test_timeouts() {
        let mut deadline = outcome(Some(EXIT_DEADLINE), "[{\"index\":0}", "");
        assert_eq!(classify(&deadline).result, VerdictStatus::Timeout);

        deadline.exit_code = None;
        deadline.signal = Some(libc::SIGXCPU);
        assert_eq!(classify(&deadline).result, VerdictStatus::Timeout);

        let mut killed = outcome(None, "", "");
        killed.state = ProcessState::Killed;
        killed.signal = Some(libc::SIGKILL);
        killed.watchdog_violation = Some(Violation::new(ViolationCategory::Timeout, "Execution exceeded 2.00s"));
        let verdict = classify(&killed);
        assert_eq!(verdict.result, VerdictStatus::Timeout);
        assert!(verdict.test_results.is_empty());
        assert!(verdict.security_violations.is_empty());
        assert_eq!(verdict.error_details.as_deref(), Some("Execution exceeded 2.00s"));
    }

    #[test]
    fn test_signal_is_error() {
        let mut crashed = outcome(None, "", "");
        crashed.signal = Some(libc::SIGSEGV);
        let verdict = classify(&crashed);
        assert_eq!(verdict.result, VerdictStatus::Error);
        assert_eq!(verdict.message, format!("Process terminated by signal {}", libc::SIGSEGV));
    }

    #[test]
    fn test_nonzero_exit_translated() {
        let stderr = "Traceback (most recent call last):\n  File \"solution.py\", line 1\n    def f(:\n          ^\nSyntaxError: invalid syntax\n";
        let verdict = classify(&outcome(Some(1), "", stderr));
        assert_eq!(verdict.result, VerdictStatus::Error);
        assert!(verdict.message.to_lowercase().contains("syntax"));
        assert!(verdict.error_details.unwrap().contains("SyntaxError"));
    }

    #[test]
    fn test_parse_failures() {
        let garbled = classify(&outcome(Some(0), "not json", "warn"));
        assert_eq!(garbled.message, "Failed to parse execution results");
        assert_eq!(garbled.error_details.as_deref(), Some("stdout: not json\nstderr: warn"));

        let short = classify(&outcome(Some(0), "[{\"index\":0,\"actual\":\"3\"}]", ""));
        assert_eq!(short.result, VerdictStatus::Error);

        let reordered = classify(&outcome(Some(0), "[{\"index\":1},{\"index\":0}]", ""));
        assert_eq!(reordered.result, VerdictStatus::Error);
    }

    #[test]
    fn test_truncated_output_is_error() {
        let mut flooded = outcome(Some(0), "xxxx", "");
        flooded.stdout_integrity = OutputIntegrity::TruncatedByJudgeLimit;
        let verdict = classify(&flooded);
        assert_eq!(verdict.result, VerdictStatus::Error);
        assert_eq!(verdict.message, "Output limit exceeded");
    }
}
