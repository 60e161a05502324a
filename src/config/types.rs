/// Core configuration types and the error taxonomy for the judge
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Languages the judge knows how to screen.
///
/// Only Python has an execution adapter; the others are scanned and then
/// reported as not implemented.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Language {
    #[serde(rename = "python")]
    Python,
    #[serde(rename = "javascript")]
    JavaScript,
    #[serde(rename = "java")]
    Java,
    #[serde(rename = "cpp")]
    Cpp,
    #[serde(rename = "c")]
    C,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::C => "c",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = JudgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" | "python3" | "py" => Ok(Language::Python),
            "javascript" | "js" | "node" => Ok(Language::JavaScript),
            "java" => Ok(Language::Java),
            "cpp" | "c++" | "cxx" | "cc" => Ok(Language::Cpp),
            "c" => Ok(Language::C),
            other => Err(JudgeError::UnsupportedLanguage(other.to_string())),
        }
    }
}

/// Resource and capability policy for one judge instance.
///
/// Built once, validated by `config::validator`, then shared read-only
/// between concurrent judgements.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SecurityConfig {
    /// Wall-clock budget for one submission, in seconds
    pub max_execution_time: f64,
    /// Address-space ceiling for the sandboxed interpreter, in MiB
    pub max_memory_mb: u64,
    /// Per-stream output ceiling, in bytes
    pub max_output_size: usize,
    /// Recursion limit installed inside the harness
    pub max_recursion_depth: u32,
    pub allow_file_operations: bool,
    pub allow_network: bool,
    pub allow_subprocess: bool,
    /// Extra seconds granted before the hard process deadline fires
    pub timeout_grace: f64,
    /// Largest accepted submission, in bytes
    pub max_code_size: usize,
    /// Interpreter used for Python submissions (bare names are resolved on a fixed PATH)
    pub python_executable: PathBuf,
    /// Parent directory of per-execution scratch directories
    pub workspace_root: PathBuf,
    /// Conventional entry-point names, tried in order
    pub entry_points: Vec<String>,
}

impl SecurityConfig {
    /// Scratch root scoped by effective UID so root and non-root runs never share it.
    pub fn default_workspace_root() -> PathBuf {
        let euid = nix::unistd::geteuid();
        std::env::temp_dir().join(format!("codexam-judge-uid-{}", euid))
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.max_execution_time.max(0.0))
    }

    /// Hard deadline enforced by the process executor.
    pub fn hard_deadline(&self) -> Duration {
        Duration::from_secs_f64((self.max_execution_time + self.timeout_grace).max(0.0))
    }

    pub fn memory_limit_bytes(&self) -> u64 {
        self.max_memory_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_execution_time: 5.0,
            max_memory_mb: 256,
            max_output_size: 64 * 1024,
            max_recursion_depth: 1000,
            allow_file_operations: false,
            allow_network: false,
            allow_subprocess: false,
            timeout_grace: 1.0,
            max_code_size: 64 * 1024,
            python_executable: PathBuf::from("python3"),
            workspace_root: Self::default_workspace_root(),
            entry_points: ["solution", "solve", "main", "answer"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Output integrity classification for a captured stream
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum OutputIntegrity {
    #[default]
    #[serde(rename = "complete")]
    Complete,
    #[serde(rename = "truncated_by_judge_limit")]
    TruncatedByJudgeLimit,
    #[serde(rename = "read_error")]
    ReadError,
    #[serde(rename = "collector_timeout")]
    CollectorTimeout,
}

impl fmt::Display for OutputIntegrity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputIntegrity::Complete => write!(f, "complete"),
            OutputIntegrity::TruncatedByJudgeLimit => write!(f, "truncated_by_judge_limit"),
            OutputIntegrity::ReadError => write!(f, "read_error"),
            OutputIntegrity::CollectorTimeout => write!(f, "collector_timeout"),
        }
    }
}

/// Custom error types for the judge
#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Harness error: {0}")]
    Harness(String),
}

impl JudgeError {
    /// Stable kind name recorded in verdict error details.
    pub fn kind(&self) -> &'static str {
        match self {
            JudgeError::Io(_) => "Io",
            JudgeError::Config(_) => "Config",
            JudgeError::Process(_) => "Process",
            JudgeError::Workspace(_) => "Workspace",
            JudgeError::UnsupportedLanguage(_) => "UnsupportedLanguage",
            JudgeError::Harness(_) => "Harness",
        }
    }
}

impl From<nix::errno::Errno> for JudgeError {
    fn from(err: nix::errno::Errno) -> Self {
        JudgeError::Process(err.to_string())
    }
}

impl From<serde_json::Error> for JudgeError {
    fn from(err: serde_json::Error) -> Self {
        JudgeError::Harness(err.to_string())
    }
}

/// Result type alias for judge operations
pub type Result<T> = std::result::Result<T, JudgeError>;
