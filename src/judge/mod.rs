//! Language adapters and the sandbox wrapper.
//!
//! The orchestrator stays language-agnostic. Adapters decide which files land
//! in the scratch directory and which interpreter command runs them.

pub mod adapter;
pub mod harness;
pub mod languages;

pub use adapter::JudgeAdapter;
pub use harness::{SandboxBundle, SandboxFile, SandboxWrapper};

use crate::config::types::{JudgeError, Language, Result};
use languages::python::PythonAdapter;

/// Adapter for `language`. Only Python submissions are executable; the
/// other languages are screened by the analyzer but not run.
pub fn adapter_for(language: Language) -> Result<Box<dyn JudgeAdapter>> {
    match language {
        Language::Python => Ok(Box::new(PythonAdapter)),
        other => Err(JudgeError::UnsupportedLanguage(format!(
            "execution of {} submissions is not implemented",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_adapter_registered() {
        let adapter = adapter_for(Language::Python).unwrap();
        assert_eq!(adapter.language(), Language::Python);
    }

    #[test]
    fn test_other_languages_not_executable() {
        for language in [Language::JavaScript, Language::Java, Language::Cpp, Language::C] {
            let err = adapter_for(language).err().unwrap();
            assert_eq!(err.kind(), "UnsupportedLanguage");
            assert!(err.to_string().contains("not implemented"));
        }
    }
}
