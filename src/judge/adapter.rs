use crate::config::types::{Language, Result, SecurityConfig};
use crate::core::types::TestCase;
use crate::judge::harness::SandboxBundle;

/// Language adapter contract: turn one submission plus its test cases into
/// a self-contained bundle the process executor can run.
pub trait JudgeAdapter: Send + Sync {
    fn language(&self) -> Language;

    /// Build the bundle. Test case data travels in side-channel files, so
    /// user code and inputs are never spliced into generated source.
    fn build(
        &self,
        code: &str,
        test_cases: &[TestCase],
        config: &SecurityConfig,
    ) -> Result<SandboxBundle>;
}
