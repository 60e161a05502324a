use crate::analysis::denylist::harness_modules;
use crate::config::types::{Language, Result, SecurityConfig};
use crate::core::types::TestCase;
use crate::judge::adapter::JudgeAdapter;
use crate::judge::harness::{run_output_limit, SandboxBundle, SandboxFile};
use serde::{Deserialize, Serialize};

const HARNESS_SOURCE: &str = include_str!("python_harness.py");

pub const HARNESS_FILE: &str = "harness.py";
pub const SOLUTION_FILE: &str = "solution.py";
pub const CASES_FILE: &str = "cases.json";
pub const POLICY_FILE: &str = "policy.json";

/// Execution policy read by the harness from `policy.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarnessPolicy {
    /// Top-level modules the guarded `__import__` admits
    pub allowed_modules: Vec<String>,
    pub allow_file_operations: bool,
    pub entry_points: Vec<String>,
    pub max_recursion_depth: u32,
    pub max_execution_time: f64,
    pub max_output_size: usize,
}

impl HarnessPolicy {
    pub fn from_config(config: &SecurityConfig) -> Self {
        Self {
            allowed_modules: harness_modules(config),
            allow_file_operations: config.allow_file_operations,
            entry_points: config.entry_points.clone(),
            max_recursion_depth: config.max_recursion_depth,
            max_execution_time: config.max_execution_time,
            max_output_size: config.max_output_size,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PythonAdapter;

impl JudgeAdapter for PythonAdapter {
    fn language(&self) -> Language {
        Language::Python
    }

    fn build(
        &self,
        code: &str,
        test_cases: &[TestCase],
        config: &SecurityConfig,
    ) -> Result<SandboxBundle> {
        let policy = HarnessPolicy::from_config(config);

        Ok(SandboxBundle {
            language: Language::Python,
            entry_script: HARNESS_FILE.to_string(),
            files: vec![
                SandboxFile::new(HARNESS_FILE, HARNESS_SOURCE),
                SandboxFile::new(SOLUTION_FILE, code),
                SandboxFile::new(CASES_FILE, serde_json::to_string(test_cases)?),
                SandboxFile::new(POLICY_FILE, serde_json::to_string(&policy)?),
            ],
            program: config.python_executable.clone(),
            // -I: no user site, no PYTHON* env, no cwd on sys.path
            // -B: no .pyc writes, -S: skip site import
            args: [
                "-I",
                "-B",
                "-S",
                HARNESS_FILE,
                SOLUTION_FILE,
                CASES_FILE,
                POLICY_FILE,
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            output_limit_bytes: run_output_limit(config, test_cases.len()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_policy_follows_capabilities() {
        let strict = HarnessPolicy::from_config(&SecurityConfig::default());
        assert!(strict.allowed_modules.contains(&"math".to_string()));
        assert!(!strict.allowed_modules.contains(&"os".to_string()));
        assert!(!strict.allow_file_operations);

        let relaxed = HarnessPolicy::from_config(&SecurityConfig {
            allow_subprocess: true,
            allow_file_operations: true,
            ..SecurityConfig::default()
        });
        assert!(relaxed.allowed_modules.contains(&"subprocess".to_string()));
        assert!(relaxed.allow_file_operations);
    }

    #[test]
    fn test_bundle_side_channel_files() {
        let cases = vec![
            TestCase::new(json!([1, 2]), "3"),
            TestCase::new(Value::Null, "ok"),
        ];
        let bundle = PythonAdapter
            .build("def solution(a, b): return a + b", &cases, &SecurityConfig::default())
            .unwrap();

        let written: Vec<TestCase> = serde_json::from_str(bundle.file(CASES_FILE).unwrap()).unwrap();
        assert_eq!(written, cases);

        let policy: HarnessPolicy = serde_json::from_str(bundle.file(POLICY_FILE).unwrap()).unwrap();
        assert_eq!(policy.entry_points[0], "solution");

        assert_eq!(bundle.args[3..], ["harness.py", "solution.py", "cases.json", "policy.json"]);
        assert_eq!(bundle.program, SecurityConfig::default().python_executable);
    }

    #[test]
    fn test_harness_reads_policy_keys() {
        let policy = serde_json::to_value(HarnessPolicy::from_config(&SecurityConfig::default())).unwrap();
        for key in policy.as_object().unwrap().keys() {
            assert!(HARNESS_SOURCE.contains(&format!("\"{key}\"")), "harness ignores {key}");
        }
    }
}
