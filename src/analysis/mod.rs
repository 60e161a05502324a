//! Static screening of submissions.
//!
//! A fast-reject heuristic layer run before anything executes. Detection is
//! over-inclusive: a single match anywhere flags the submission. The analyzer
//! never executes or evaluates the code it scans.

pub mod denylist;
pub mod lexer;
pub mod python;

use crate::config::types::{Language, SecurityConfig};
use crate::core::types::{Violation, ViolationCategory};
use python::PythonRules;
use std::collections::HashSet;

/// Ordered violation collector that drops repeated descriptions.
#[derive(Debug, Default)]
pub struct ViolationSink {
    seen: HashSet<String>,
    violations: Vec<Violation>,
}

impl ViolationSink {
    pub fn push(&mut self, violation: Violation) {
        if self.seen.insert(violation.description.clone()) {
            self.violations.push(violation);
        }
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }
}

/// Deny-list scanner bound to one configuration
#[derive(Debug, Clone)]
pub struct StaticAnalyzer {
    config: SecurityConfig,
    python: PythonRules,
}

impl StaticAnalyzer {
    pub fn new(config: &SecurityConfig) -> Self {
        Self {
            config: config.clone(),
            python: PythonRules::from_config(config),
        }
    }

    /// Screen `code` written in `language`. An empty result means no
    /// deny-listed construct was found.
    pub fn scan(&self, code: &str, language: Language) -> Vec<Violation> {
        let mut sink = ViolationSink::default();

        if language == Language::Python {
            match lexer::tokenize(code) {
                Ok(tokens) => python::walk(&tokens, &self.python, &mut sink),
                Err(e) => log::debug!("Skipping token walk, source does not lex: {}", e),
            }
        }

        let patterns = denylist::text_patterns(language, &self.config);
        scan_text(code, &patterns, &mut sink);

        sink.into_violations()
    }
}

/// Convenience wrapper for one-off scans.
pub fn scan(code: &str, language: Language, config: &SecurityConfig) -> Vec<Violation> {
    StaticAnalyzer::new(config).scan(code, language)
}

fn is_ident_byte(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric()
}

/// Case-insensitive whole-text scan. Patterns that start with an identifier
/// character only match at the start of a word, so `my_eval(` is not `eval(`.
fn scan_text(code: &str, patterns: &[&str], sink: &mut ViolationSink) {
    let lowered = code.to_ascii_lowercase();
    let bytes = lowered.as_bytes();

    for pattern in patterns {
        let needs_boundary = pattern.bytes().next().map_or(false, is_ident_byte);
        let hit = lowered.match_indices(pattern).map(|(idx, _)| idx).find(|&idx| {
            !needs_boundary || idx == 0 || !is_ident_byte(bytes[idx - 1])
        });

        if let Some(idx) = hit {
            let line = bytes[..idx].iter().filter(|&&b| b == b'\n').count() + 1;
            sink.push(
                Violation::new(
                    ViolationCategory::DisallowedPattern,
                    format!("Disallowed pattern '{}'", pattern),
                )
                .at_line(line),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_scan(code: &str, language: Language) -> Vec<Violation> {
        scan(code, language, &SecurityConfig::default())
    }

    #[test]
    fn test_safe_python_is_clean() {
        let code = "def solution(nums, target):\n    seen = {}\n    for i, n in enumerate(nums):\n        if target - n in seen:\n            return [seen[target - n], i]\n        seen[n] = i\n";
        assert!(default_scan(code, Language::Python).is_empty());
    }

    #[test]
    fn test_os_system_flagged() {
        let v = default_scan("import os\nos.system('ls')", Language::Python);
        assert!(v.iter().any(|v| v.category == ViolationCategory::DisallowedImport));
        assert!(v.iter().any(|v| v.category == ViolationCategory::DisallowedCall));
        assert!(v
            .iter()
            .any(|v| v.description == "Disallowed pattern 'os.system'" && v.line == Some(2)));
    }

    #[test]
    fn test_unlexable_source_still_text_scanned() {
        let v = default_scan("x = eval('1' \n__import__('os'", Language::Python);
        assert!(!v.is_empty());
        assert!(v.iter().all(|v| v.category == ViolationCategory::DisallowedPattern));
    }

    #[test]
    fn test_normalized_and_escaped_spellings_flagged() {
        let fullwidth = "w = [c for c in ().__class\u{ff3f}\u{ff3f}.__base\u{ff3f}\u{ff3f}.__subclasses\u{ff3f}\u{ff3f}() if c.__name__ == '_wrap_close'][0]\n\
                         print(w.__init__.__globals\u{ff3f}\u{ff3f}['listdir']('/'))\n";
        assert!(!default_scan(fullwidth, Language::Python).is_empty());

        let escaped = "def solution(x):\n    return \"{0.__cl\\x61ss__}\".format(x)\n";
        let v = default_scan(escaped, Language::Python);
        assert!(v.iter().any(|v| v.category == ViolationCategory::SuspiciousString));
    }

    #[test]
    fn test_word_boundary() {
        assert!(default_scan("def my_eval(x):\n    return x\n", Language::Python).is_empty());
        assert!(!default_scan("x = obj.eval(1)", Language::JavaScript).is_empty());
    }

    #[test]
    fn test_javascript_patterns() {
        let v = default_scan("const fs = REQUIRE('fs');", Language::JavaScript);
        assert_eq!(v[0].description, "Disallowed pattern 'require('");
        assert!(default_scan("function add(a, b) { return a + b; }", Language::JavaScript).is_empty());
    }

    #[test]
    fn test_native_and_java_patterns() {
        assert!(!default_scan("int main() { system(\"ls\"); }", Language::Cpp).is_empty());
        assert!(!default_scan("Runtime.getRuntime().exec(cmd);", Language::Java).is_empty());
        assert!(default_scan("int main() { return 0; }", Language::C).is_empty());
    }

    #[test]
    fn test_capabilities_relax_text_scan() {
        let config = SecurityConfig {
            allow_network: true,
            ..SecurityConfig::default()
        };
        assert!(scan("fetch(url)", Language::JavaScript, &config).is_empty());
    }

    #[test]
    fn test_scan_is_deterministic() {
        let code = "import os, sys\nx = eval(input())\n";
        let analyzer = StaticAnalyzer::new(&SecurityConfig::default());
        assert_eq!(analyzer.scan(code, Language::Python), analyzer.scan(code, Language::Python));
    }
}
