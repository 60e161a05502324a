/// Security audit events for the judge
///
/// Each event is logged through the `log` facade at a severity-derived level
/// and, when an audit file is configured, appended to it as one JSON object per
/// line. Events carry the run id and a digest of the submission so they can be
/// correlated without storing source code.
use crate::config::types::{JudgeError, Result};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Security event severity levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SecuritySeverity {
    Critical,
    High,
    Medium,
    Low,
}

/// Types of security events the judge emits
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SecurityEventType {
    ExecutionStart,
    ExecutionEnd,
    SubmissionRejected,
    WallTimeLimitViolation,
    ForcedKill,
    OutputLimitViolation,
    CleanupFailure,
    AdmissionDenied,
    InternalFailure,
}

impl SecurityEventType {
    pub fn default_severity(&self) -> SecuritySeverity {
        match self {
            SecurityEventType::ExecutionStart => SecuritySeverity::Low,
            SecurityEventType::ExecutionEnd => SecuritySeverity::Low,
            SecurityEventType::SubmissionRejected => SecuritySeverity::Medium,
            SecurityEventType::WallTimeLimitViolation => SecuritySeverity::Medium,
            SecurityEventType::ForcedKill => SecuritySeverity::High,
            SecurityEventType::OutputLimitViolation => SecuritySeverity::Medium,
            SecurityEventType::CleanupFailure => SecuritySeverity::Critical,
            SecurityEventType::AdmissionDenied => SecuritySeverity::Medium,
            SecurityEventType::InternalFailure => SecuritySeverity::High,
        }
    }
}

/// One audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: SecurityEventType,
    pub severity: SecuritySeverity,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl SecurityEvent {
    pub fn new(event_type: SecurityEventType, details: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            severity: event_type.default_severity(),
            details: details.into(),
            run_id: None,
            code_sha256: None,
            client_id: None,
        }
    }

    pub fn with_run_id(mut self, run_id: &str) -> Self {
        self.run_id = Some(run_id.to_string());
        self
    }

    pub fn with_code_digest(mut self, digest: &str) -> Self {
        self.code_sha256 = Some(digest.to_string());
        self
    }

    pub fn with_client(mut self, client_id: &str) -> Self {
        self.client_id = Some(client_id.to_string());
        self
    }

    pub fn with_severity(mut self, severity: SecuritySeverity) -> Self {
        self.severity = severity;
        self
    }
}

/// Hex SHA-256 of a submission.
pub fn submission_digest(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Audit sink owned by one judge instance
#[derive(Debug, Default)]
pub struct AuditLog {
    file: Option<Mutex<File>>,
    path: Option<PathBuf>,
}

impl AuditLog {
    /// Log-facade only; nothing is written to disk.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Append JSON lines to `path`, creating parent directories as needed.
    pub fn to_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    JudgeError::Config(format!("Failed to create audit log directory: {}", e))
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| JudgeError::Config(format!("Failed to open audit log: {}", e)))?;

        Ok(Self {
            file: Some(Mutex::new(file)),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record(&self, event: SecurityEvent) {
        let run = event.run_id.as_deref().unwrap_or("-");
        match event.severity {
            SecuritySeverity::Critical | SecuritySeverity::High => {
                error!("SECURITY {:?} [{}]: {}", event.event_type, run, event.details)
            }
            SecuritySeverity::Medium => {
                warn!("SECURITY {:?} [{}]: {}", event.event_type, run, event.details)
            }
            SecuritySeverity::Low => {
                info!("SECURITY {:?} [{}]: {}", event.event_type, run, event.details)
            }
        }

        let Some(file) = &self.file else {
            return;
        };

        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize audit event: {}", e);
                return;
            }
        };

        match file.lock() {
            Ok(mut file) => {
                if let Err(e) = writeln!(file, "{}", line).and_then(|_| file.flush()) {
                    error!("Failed to write audit log: {}", e);
                }
            }
            Err(_) => error!("Audit log lock poisoned"),
        }
    }
}
