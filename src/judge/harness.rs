/// Sandbox wrapper
///
/// Produces the self-contained program that runs a submission against its
/// test cases. The program text is a fixed template; the submission, the
/// cases and the execution policy are separate files in the scratch
/// directory, so nothing user-supplied is ever spliced into source.
use crate::config::types::{JudgeError, Language, Result, SecurityConfig};
use crate::core::types::{LaunchRequest, TestCase};
use crate::judge::adapter_for;
use crate::safety::workspace::Workspace;
use std::path::PathBuf;
use std::time::Duration;

/// Descriptors the harness may hold open: std streams, the interpreter's own
/// files and whatever the allowed modules open on import.
const OPEN_FILES_LIMIT: u64 = 64;

/// One file placed in the scratch directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxFile {
    pub name: String,
    pub contents: String,
}

impl SandboxFile {
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

/// Everything needed to run one submission: the files to install and the
/// interpreter command line, relative to the scratch directory.
#[derive(Debug, Clone)]
pub struct SandboxBundle {
    pub language: Language,
    /// Name of the file holding the generated program
    pub entry_script: String,
    pub files: Vec<SandboxFile>,
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Per-stream stdout/stderr capture limit for the whole run
    pub output_limit_bytes: usize,
}

impl SandboxBundle {
    /// Text of the generated program.
    pub fn script_text(&self) -> Option<&str> {
        self.file(&self.entry_script)
    }

    pub fn file(&self, name: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.contents.as_str())
    }

    /// Write every file into `workspace` and describe the process to launch.
    pub fn install(&self, workspace: &Workspace, config: &SecurityConfig) -> Result<LaunchRequest> {
        if self.script_text().is_none() {
            return Err(JudgeError::Harness(format!(
                "bundle has no entry script '{}'",
                self.entry_script
            )));
        }

        for file in &self.files {
            workspace.write_file(&file.name, file.contents.as_bytes())?;
        }
        log::debug!(
            "Installed {} sandbox files in {}",
            self.files.len(),
            workspace.run_dir().display()
        );

        Ok(LaunchRequest {
            program: self.program.clone(),
            args: self.args.clone(),
            workdir: workspace.run_dir().to_path_buf(),
            timeout: config.execution_timeout(),
            grace: Duration::from_secs_f64(config.timeout_grace),
            memory_limit_bytes: config.memory_limit_bytes(),
            cpu_limit_secs: config.max_execution_time.ceil() as u64 + 1,
            output_limit_bytes: self.output_limit_bytes,
            file_size_limit_bytes: config.max_output_size as u64,
            open_files_limit: OPEN_FILES_LIMIT,
        })
    }
}

/// Stateless front door over the language adapters.
pub struct SandboxWrapper;

impl SandboxWrapper {
    pub fn build(
        language: Language,
        user_code: &str,
        test_cases: &[TestCase],
        config: &SecurityConfig,
    ) -> Result<SandboxBundle> {
        adapter_for(language)?.build(user_code, test_cases, config)
    }
}

/// Stdout budget for a run: every case may print and return up to
/// `max_output_size` each, plus JSON escaping overhead and the load phase.
pub fn run_output_limit(config: &SecurityConfig, cases: usize) -> usize {
    config
        .max_output_size
        .saturating_mul(4)
        .saturating_mul(cases.saturating_add(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::workspace::WorkspaceManager;
    use serde_json::json;
    use tempfile::TempDir;

    fn cases() -> Vec<TestCase> {
        vec![TestCase::new(json!([[2, 7, 11, 15], 9]), "[0, 1]")]
    }

    #[test]
    fn test_build_python_bundle() {
        let config = SecurityConfig::default();
        let bundle = SandboxWrapper::build(Language::Python, "def solution(): pass", &cases(), &config).unwrap();
        assert_eq!(bundle.entry_script, "harness.py");
        assert!(bundle.script_text().unwrap().contains("def main(argv)"));
        assert_eq!(bundle.file("solution.py"), Some("def solution(): pass"));
        assert_eq!(bundle.output_limit_bytes, config.max_output_size * 8);
    }

    #[test]
    fn test_script_is_independent_of_submission() {
        let config = SecurityConfig::default();
        let a = SandboxWrapper::build(Language::Python, "x = 1", &cases(), &config).unwrap();
        let b = SandboxWrapper::build(Language::Python, "'''\"\"\"\nx = 2", &cases(), &config).unwrap();
        assert_eq!(a.script_text(), b.script_text());
    }

    #[test]
    fn test_build_unsupported_language() {
        let err = SandboxWrapper::build(Language::JavaScript, "1", &cases(), &SecurityConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, JudgeError::UnsupportedLanguage(_)));
    }

    #[test]
    fn test_install_writes_files_and_limits() {
        let temp = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(temp.path().join("runs")).unwrap();
        let workspace = manager.create_workspace().unwrap();
        let config = SecurityConfig {
            max_execution_time: 2.5,
            ..SecurityConfig::default()
        };

        let bundle = SandboxWrapper::build(Language::Python, "def solve(x): return x", &cases(), &config).unwrap();
        let request = bundle.install(&workspace, &config).unwrap();

        for name in ["harness.py", "solution.py", "cases.json", "policy.json"] {
            assert!(workspace.run_dir().join(name).is_file(), "{name} missing");
        }
        assert_eq!(request.workdir, workspace.run_dir());
        assert_eq!(request.cpu_limit_secs, 4);
        assert_eq!(request.timeout, Duration::from_secs_f64(2.5));
        assert_eq!(request.file_size_limit_bytes, config.max_output_size as u64);
        assert_eq!(request.open_files_limit, OPEN_FILES_LIMIT);
    }

    #[test]
    fn test_output_limit_saturates() {
        let config = SecurityConfig {
            max_output_size: usize::MAX / 2,
            ..SecurityConfig::default()
        };
        assert_eq!(run_output_limit(&config, 10), usize::MAX);
    }
}
