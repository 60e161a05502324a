/// Judge orchestration
///
/// scan -> reject on violations -> build sandbox bundle -> run under limits
/// -> classify. `execute` always returns a verdict; internal errors and
/// panics become `ERROR` verdicts with the failure recorded in
/// `error_details`.
use crate::admission::SlidingWindowLimiter;
use crate::analysis::StaticAnalyzer;
use crate::config::types::{JudgeError, Language, OutputIntegrity, Result, SecurityConfig};
use crate::config::validator::validate_config;
use crate::core::types::{ExecutionVerdict, ProcessState, TestCase};
use crate::exec::executor::{ProcessExecutor, ProcessRunner};
use crate::exec::limiter::ResourceLimiter;
use crate::judge::SandboxWrapper;
use crate::observability::audit::{submission_digest, AuditLog, SecurityEvent, SecurityEventType};
use crate::safety::workspace::WorkspaceManager;
use crate::verdict::VerdictClassifier;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Scratch directories older than this are left over from a crashed judge.
const STALE_WORKSPACE_AGE: Duration = Duration::from_secs(3600);

/// Judge instance. Holds only read-only state, so one instance can serve
/// concurrent `execute` calls from several threads.
pub struct Judge<R: ProcessRunner = ProcessExecutor> {
    config: Arc<SecurityConfig>,
    analyzer: StaticAnalyzer,
    workspaces: WorkspaceManager,
    audit: AuditLog,
    runner: R,
}

impl Judge<ProcessExecutor> {
    pub fn new(config: SecurityConfig) -> Result<Self> {
        Self::with_runner(config, ProcessExecutor::new())
    }
}

impl<R: ProcessRunner> Judge<R> {
    /// Validate `config`, prepare the workspace root and sweep stale runs.
    pub fn with_runner(config: SecurityConfig, runner: R) -> Result<Self> {
        validate_config(&config)?;

        let workspaces = WorkspaceManager::new(config.workspace_root.clone())?;
        match workspaces.cleanup_stale(STALE_WORKSPACE_AGE) {
            Ok(0) => {}
            Ok(removed) => log::info!("Removed {} stale workspaces", removed),
            Err(e) => log::warn!("Stale workspace sweep failed: {}", e),
        }

        Ok(Self {
            analyzer: StaticAnalyzer::new(&config),
            config: Arc::new(config),
            workspaces,
            audit: AuditLog::disabled(),
            runner,
        })
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    pub fn analyzer(&self) -> &StaticAnalyzer {
        &self.analyzer
    }

    /// Judge one submission. Never panics and never returns an error.
    pub fn execute(&self, language: &str, code: &str, test_cases: &[TestCase]) -> ExecutionVerdict {
        let run_id = Uuid::new_v4().to_string();
        let digest = submission_digest(code);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.judge(&run_id, &digest, language, code, test_cases)
        }));

        let verdict = match outcome {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => self.internal_failure(&run_id, &digest, language, e.kind(), &e.to_string()),
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                self.internal_failure(&run_id, &digest, language, "Panic", &message)
            }
        };

        self.audit.record(
            SecurityEvent::new(
                SecurityEventType::ExecutionEnd,
                format!("{}: {}", verdict.result, verdict.message),
            )
            .with_run_id(&run_id)
            .with_code_digest(&digest),
        );
        verdict
    }

    /// `execute` behind a caller-owned rate limiter. A denied request is
    /// neither scanned nor run.
    pub fn execute_admitted(
        &self,
        limiter: &mut SlidingWindowLimiter,
        client_id: &str,
        language: &str,
        code: &str,
        test_cases: &[TestCase],
    ) -> ExecutionVerdict {
        if !limiter.check(client_id, Instant::now()) {
            let run_id = Uuid::new_v4().to_string();
            self.audit.record(
                SecurityEvent::new(
                    SecurityEventType::AdmissionDenied,
                    format!(
                        "more than {} requests within {:?}",
                        limiter.max_requests(),
                        limiter.window()
                    ),
                )
                .with_run_id(&run_id)
                .with_client(client_id),
            );
            return ExecutionVerdict::error(&run_id, language, "Rate limit exceeded");
        }
        self.execute(language, code, test_cases)
    }

    fn judge(
        &self,
        run_id: &str,
        digest: &str,
        language_name: &str,
        code: &str,
        test_cases: &[TestCase],
    ) -> Result<ExecutionVerdict> {
        let language: Language = match language_name.parse() {
            Ok(language) => language,
            Err(e) => return Ok(ExecutionVerdict::error(run_id, language_name, e.to_string())),
        };
        let lang = language.as_str();

        if code.len() > self.config.max_code_size {
            return Ok(ExecutionVerdict::error(
                run_id,
                lang,
                format!(
                    "Submission exceeds the maximum code size of {} bytes",
                    self.config.max_code_size
                ),
            ));
        }

        let violations = self.analyzer.scan(code, language);
        if !violations.is_empty() {
            self.audit.record(
                SecurityEvent::new(
                    SecurityEventType::SubmissionRejected,
                    format!("{} violations, first: {}", violations.len(), violations[0]),
                )
                .with_run_id(run_id)
                .with_code_digest(digest),
            );
            let mut verdict = ExecutionVerdict::error(
                run_id,
                lang,
                format!("Security violations detected: {}", violations.len()),
            );
            verdict.security_violations = violations;
            return Ok(verdict);
        }

        if test_cases.is_empty() {
            return Ok(ExecutionVerdict::error(run_id, lang, "No test cases supplied"));
        }

        let bundle = match SandboxWrapper::build(language, code, test_cases, &self.config) {
            Ok(bundle) => bundle,
            Err(JudgeError::UnsupportedLanguage(reason)) => {
                return Ok(ExecutionVerdict::error(run_id, lang, capitalize(&reason)));
            }
            Err(e) => return Err(e),
        };

        let mut workspace = self.workspaces.create_workspace()?;
        let request = bundle.install(&workspace, &self.config)?;

        self.audit.record(
            SecurityEvent::new(
                SecurityEventType::ExecutionStart,
                format!("{} submission, {} test cases", lang, test_cases.len()),
            )
            .with_run_id(run_id)
            .with_code_digest(digest),
        );

        let mut limiter = ResourceLimiter::new(&self.config);
        let outcome = self.runner.run(&request, &mut limiter)?;
        self.audit_outcome(run_id, outcome.state, outcome.stdout_integrity);

        let mut verdict = VerdictClassifier::classify(&outcome, test_cases, run_id, language);
        verdict.memory_used = limiter.stats().peak_memory.or(verdict.memory_used);

        if let Err(e) = workspace.cleanup() {
            self.audit.record(
                SecurityEvent::new(SecurityEventType::CleanupFailure, e.to_string()).with_run_id(run_id),
            );
        }

        Ok(verdict)
    }

    fn audit_outcome(&self, run_id: &str, state: ProcessState, stdout: OutputIntegrity) {
        let event = match state {
            ProcessState::Killed => Some(SecurityEvent::new(
                SecurityEventType::WallTimeLimitViolation,
                format!("exceeded {}s, process group killed", self.config.max_execution_time),
            )),
            ProcessState::TimedOut => Some(SecurityEvent::new(
                SecurityEventType::ForcedKill,
                "hard deadline reached, process group killed",
            )),
            _ => None,
        };
        if let Some(event) = event {
            self.audit.record(event.with_run_id(run_id));
        }
        if stdout == OutputIntegrity::TruncatedByJudgeLimit {
            self.audit.record(
                SecurityEvent::new(SecurityEventType::OutputLimitViolation, "stdout truncated")
                    .with_run_id(run_id),
            );
        }
    }

    fn internal_failure(
        &self,
        run_id: &str,
        digest: &str,
        language: &str,
        kind: &str,
        message: &str,
    ) -> ExecutionVerdict {
        log::error!("Run {} failed internally: {}: {}", run_id, kind, message);
        self.audit.record(
            SecurityEvent::new(SecurityEventType::InternalFailure, format!("{}: {}", kind, message))
                .with_run_id(run_id)
                .with_code_digest(digest),
        );
        ExecutionVerdict::error(run_id, language, "Internal judge error")
            .with_details(format!("{}: {}", kind, message))
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
