//! Per-language deny-lists.
//!
//! Entries are tagged with the capability that admits them. `Always` entries
//! are denied regardless of configuration.

use crate::config::types::{Language, SecurityConfig};
use std::collections::HashSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gate {
    Always,
    File,
    Network,
    Subprocess,
}

impl Gate {
    /// Whether an entry with this gate is denied under `config`.
    pub fn denies(self, config: &SecurityConfig) -> bool {
        match self {
            Gate::Always => true,
            Gate::File => !config.allow_file_operations,
            Gate::Network => !config.allow_network,
            Gate::Subprocess => !config.allow_subprocess,
        }
    }
}

pub type Table = &'static [(&'static str, Gate)];

pub static PYTHON_MODULES: Table = &[
    ("sys", Gate::Always),
    ("builtins", Gate::Always),
    ("importlib", Gate::Always),
    ("ctypes", Gate::Always),
    ("cffi", Gate::Always),
    ("pickle", Gate::Always),
    ("cpickle", Gate::Always),
    ("_pickle", Gate::Always),
    ("marshal", Gate::Always),
    ("shelve", Gate::Always),
    ("threading", Gate::Always),
    ("_thread", Gate::Always),
    ("gc", Gate::Always),
    ("inspect", Gate::Always),
    ("code", Gate::Always),
    ("codeop", Gate::Always),
    ("runpy", Gate::Always),
    ("pkgutil", Gate::Always),
    ("zipimport", Gate::Always),
    ("site", Gate::Always),
    ("sysconfig", Gate::Always),
    ("types", Gate::Always),
    ("resource", Gate::Always),
    ("mmap", Gate::Always),
    ("fcntl", Gate::Always),
    ("atexit", Gate::Always),
    ("faulthandler", Gate::Always),
    ("platform", Gate::Always),
    ("os", Gate::Subprocess),
    ("posix", Gate::Subprocess),
    ("nt", Gate::Subprocess),
    ("subprocess", Gate::Subprocess),
    ("multiprocessing", Gate::Subprocess),
    ("concurrent", Gate::Subprocess),
    ("pty", Gate::Subprocess),
    ("signal", Gate::Subprocess),
    ("io", Gate::File),
    ("pathlib", Gate::File),
    ("shutil", Gate::File),
    ("tempfile", Gate::File),
    ("glob", Gate::File),
    ("fileinput", Gate::File),
    ("linecache", Gate::File),
    ("codecs", Gate::File),
    ("dbm", Gate::File),
    ("sqlite3", Gate::File),
    ("socket", Gate::Network),
    ("ssl", Gate::Network),
    ("select", Gate::Network),
    ("selectors", Gate::Network),
    ("asyncio", Gate::Network),
    ("urllib", Gate::Network),
    ("urllib2", Gate::Network),
    ("http", Gate::Network),
    ("ftplib", Gate::Network),
    ("smtplib", Gate::Network),
    ("poplib", Gate::Network),
    ("imaplib", Gate::Network),
    ("telnetlib", Gate::Network),
    ("socketserver", Gate::Network),
    ("xmlrpc", Gate::Network),
    ("webbrowser", Gate::Network),
    ("requests", Gate::Network),
];

/// Builtins whose direct call is denied.
pub static PYTHON_CALLS: Table = &[
    ("eval", Gate::Always),
    ("exec", Gate::Always),
    ("compile", Gate::Always),
    ("__import__", Gate::Always),
    ("globals", Gate::Always),
    ("locals", Gate::Always),
    ("vars", Gate::Always),
    ("getattr", Gate::Always),
    ("setattr", Gate::Always),
    ("delattr", Gate::Always),
    ("breakpoint", Gate::Always),
    ("open", Gate::File),
];

/// Method names denied when called through an attribute (`x.name(...)`).
/// `compile` is absent so `re.compile` stays usable.
pub static PYTHON_ATTRIBUTE_CALLS: Table = &[
    ("eval", Gate::Always),
    ("exec", Gate::Always),
    ("__import__", Gate::Always),
    ("globals", Gate::Always),
    ("locals", Gate::Always),
    ("vars", Gate::Always),
    ("getattr", Gate::Always),
    ("setattr", Gate::Always),
    ("delattr", Gate::Always),
    ("breakpoint", Gate::Always),
    ("import_module", Gate::Always),
    ("load_module", Gate::Always),
    ("exec_module", Gate::Always),
    ("open", Gate::File),
    ("rmtree", Gate::File),
    ("unlink", Gate::File),
    ("rmdir", Gate::File),
    ("chmod", Gate::File),
    ("chown", Gate::File),
    ("system", Gate::Subprocess),
    ("popen", Gate::Subprocess),
    ("fork", Gate::Subprocess),
    ("forkpty", Gate::Subprocess),
    ("execv", Gate::Subprocess),
    ("execve", Gate::Subprocess),
    ("execvp", Gate::Subprocess),
    ("execvpe", Gate::Subprocess),
    ("execl", Gate::Subprocess),
    ("execle", Gate::Subprocess),
    ("execlp", Gate::Subprocess),
    ("spawnl", Gate::Subprocess),
    ("spawnv", Gate::Subprocess),
    ("spawnve", Gate::Subprocess),
    ("posix_spawn", Gate::Subprocess),
    ("kill", Gate::Subprocess),
    ("killpg", Gate::Subprocess),
    ("putenv", Gate::Subprocess),
];

/// Builtins flagged even when merely referenced (`f = eval`).
pub static PYTHON_BARE_REFERENCES: &[&str] = &[
    "eval",
    "exec",
    "compile",
    "__import__",
    "globals",
    "locals",
    "vars",
    "getattr",
    "setattr",
    "delattr",
    "breakpoint",
];

/// Ordinary protocol dunders that may be accessed as attributes.
pub static SAFE_DUNDERS: &[&str] = &[
    "__init__",
    "__name__",
    "__doc__",
    "__len__",
    "__str__",
    "__repr__",
    "__eq__",
    "__ne__",
    "__lt__",
    "__le__",
    "__gt__",
    "__ge__",
    "__hash__",
    "__iter__",
    "__next__",
    "__contains__",
    "__getitem__",
    "__setitem__",
    "__delitem__",
    "__add__",
    "__sub__",
    "__mul__",
    "__truediv__",
    "__floordiv__",
    "__mod__",
    "__pow__",
    "__neg__",
    "__abs__",
    "__bool__",
    "__call__",
    "__enter__",
    "__exit__",
];

/// Introspection names that enable sandbox escape, flagged anywhere.
pub static DANGEROUS_DUNDERS: &[&str] = &[
    "__builtins__",
    "__globals__",
    "__subclasses__",
    "__class__",
    "__bases__",
    "__base__",
    "__mro__",
    "__code__",
    "__dict__",
    "__loader__",
    "__spec__",
    "__closure__",
    "__func__",
    "__self__",
    "__getattribute__",
    "__reduce__",
    "__reduce_ex__",
];

/// Substrings flagged inside Python string literals.
pub static PYTHON_STRING_PATTERNS: Table = &[
    ("eval(", Gate::Always),
    ("exec(", Gate::Always),
    ("compile(", Gate::Always),
    ("getattr(", Gate::Always),
    ("__import__", Gate::Always),
    ("__builtins__", Gate::Always),
    ("__globals__", Gate::Always),
    ("__subclasses__", Gate::Always),
    ("__class__", Gate::Always),
    ("__bases__", Gate::Always),
    ("__mro__", Gate::Always),
    ("import os", Gate::Subprocess),
    ("os.system", Gate::Subprocess),
    ("subprocess", Gate::Subprocess),
    ("open(", Gate::File),
    ("socket", Gate::Network),
];

/// Whole-text patterns for Python, matched case-insensitively on a word boundary.
pub static PYTHON_TEXT_PATTERNS: Table = &[
    ("__import__", Gate::Always),
    ("eval(", Gate::Always),
    ("exec(", Gate::Always),
    ("__builtins__", Gate::Always),
    ("__subclasses__", Gate::Always),
    ("__globals__", Gate::Always),
    ("importlib", Gate::Always),
    ("ctypes", Gate::Always),
    ("sys.modules", Gate::Always),
    ("os.system", Gate::Subprocess),
    ("os.popen", Gate::Subprocess),
    ("subprocess", Gate::Subprocess),
];

pub static JAVASCRIPT_PATTERNS: Table = &[
    ("require(", Gate::Always),
    ("import(", Gate::Always),
    ("eval(", Gate::Always),
    ("new function", Gate::Always),
    ("process.", Gate::Always),
    ("globalthis", Gate::Always),
    ("constructor.constructor", Gate::Always),
    ("__proto__", Gate::Always),
    ("deno.", Gate::Always),
    ("bun.", Gate::Always),
    ("document.", Gate::Always),
    ("window.", Gate::Always),
    ("settimeout(", Gate::Always),
    ("setinterval(", Gate::Always),
    ("worker(", Gate::Always),
    ("fs.", Gate::File),
    ("child_process", Gate::Subprocess),
    ("fetch(", Gate::Network),
    ("xmlhttprequest", Gate::Network),
    ("websocket", Gate::Network),
];

/// Fallback for any language without a dedicated list.
pub static GENERIC_PATTERNS: Table = &[
    ("system(", Gate::Subprocess),
    ("exec(", Gate::Subprocess),
    ("popen(", Gate::Subprocess),
];

pub static JAVA_PATTERNS: Table = &[
    ("runtime.getruntime", Gate::Subprocess),
    ("processbuilder", Gate::Subprocess),
    ("class.forname", Gate::Always),
    ("java.lang.reflect", Gate::Always),
    ("setaccessible(", Gate::Always),
    ("system.exit", Gate::Always),
    ("sun.misc.unsafe", Gate::Always),
    ("new thread(", Gate::Always),
    ("java.io.file", Gate::File),
    ("java.nio.file", Gate::File),
    ("fileinputstream", Gate::File),
    ("fileoutputstream", Gate::File),
    ("java.net", Gate::Network),
];

pub static NATIVE_PATTERNS: Table = &[
    ("fork(", Gate::Subprocess),
    ("vfork(", Gate::Subprocess),
    ("execv", Gate::Subprocess),
    ("execl", Gate::Subprocess),
    ("kill(", Gate::Subprocess),
    ("ptrace(", Gate::Always),
    ("syscall(", Gate::Always),
    ("dlopen(", Gate::Always),
    ("mmap(", Gate::Always),
    ("mprotect(", Gate::Always),
    ("asm(", Gate::Always),
    ("__asm__", Gate::Always),
    ("setrlimit(", Gate::Always),
    ("<sys/", Gate::Always),
    ("fopen(", Gate::File),
    ("open(", Gate::File),
    ("unlink(", Gate::File),
    ("remove(", Gate::File),
    ("<fstream>", Gate::File),
    ("socket(", Gate::Network),
    ("connect(", Gate::Network),
    ("<netdb.h>", Gate::Network),
];

/// Entries of `table` that `config` denies.
pub fn active(table: Table, config: &SecurityConfig) -> Vec<&'static str> {
    table
        .iter()
        .filter(|(_, gate)| gate.denies(config))
        .map(|(entry, _)| *entry)
        .collect()
}

pub fn active_set(table: Table, config: &SecurityConfig) -> HashSet<&'static str> {
    active(table, config).into_iter().collect()
}

/// Whole-text patterns for `language`. Non-Python languages also get the
/// generic fallback entries.
pub fn text_patterns(language: Language, config: &SecurityConfig) -> Vec<&'static str> {
    let specific = match language {
        Language::Python => PYTHON_TEXT_PATTERNS,
        Language::JavaScript => JAVASCRIPT_PATTERNS,
        Language::Java => JAVA_PATTERNS,
        Language::Cpp | Language::C => NATIVE_PATTERNS,
    };

    let mut patterns = active(specific, config);
    if language != Language::Python {
        for pattern in active(GENERIC_PATTERNS, config) {
            if !patterns.contains(&pattern) {
                patterns.push(pattern);
            }
        }
    }
    patterns
}

/// Standard-library modules the harness lets submissions import at runtime.
pub static HARNESS_BASE_MODULES: &[&str] = &[
    "math",
    "cmath",
    "random",
    "string",
    "re",
    "collections",
    "itertools",
    "functools",
    "operator",
    "heapq",
    "bisect",
    "array",
    "copy",
    "decimal",
    "fractions",
    "numbers",
    "statistics",
    "datetime",
    "time",
    "calendar",
    "typing",
    "dataclasses",
    "enum",
    "abc",
    "json",
    "textwrap",
    "unicodedata",
    "queue",
];

/// Harness module allow-list: the base set plus everything a capability admits.
pub fn harness_modules(config: &SecurityConfig) -> Vec<String> {
    let mut modules: Vec<String> = HARNESS_BASE_MODULES.iter().map(|m| m.to_string()).collect();
    for (module, gate) in PYTHON_MODULES {
        if *gate != Gate::Always && !gate.denies(config) {
            modules.push(module.to_string());
        }
    }
    modules.sort();
    modules.dedup();
    modules
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_denies_everything_gated() {
        let config = SecurityConfig::default();
        let modules = active_set(PYTHON_MODULES, &config);
        assert!(modules.contains("os"));
        assert!(modules.contains("socket"));
        assert!(modules.contains("pathlib"));
        assert!(active(PYTHON_CALLS, &config).contains(&"open"));
    }

    #[test]
    fn test_capabilities_relax_lists() {
        let config = SecurityConfig {
            allow_subprocess: true,
            allow_file_operations: true,
            ..SecurityConfig::default()
        };
        let modules = active_set(PYTHON_MODULES, &config);
        assert!(!modules.contains("os"));
        assert!(!modules.contains("io"));
        assert!(modules.contains("socket"));
        assert!(modules.contains("sys"));
        assert!(!active(PYTHON_CALLS, &config).contains(&"open"));

        let harness = harness_modules(&config);
        assert!(harness.contains(&"subprocess".to_string()));
        assert!(!harness.contains(&"sys".to_string()));
    }

    #[test]
    fn test_text_patterns_include_generic_fallback() {
        let config = SecurityConfig::default();
        let java = text_patterns(Language::Java, &config);
        assert!(java.contains(&"system("));
        assert!(java.contains(&"processbuilder"));

        let python = text_patterns(Language::Python, &config);
        assert!(!python.contains(&"system("));
        assert!(python.contains(&"__import__"));
    }

    #[test]
    fn test_harness_base_has_no_dangerous_modules() {
        let denied = active_set(PYTHON_MODULES, &SecurityConfig::default());
        for module in harness_modules(&SecurityConfig::default()) {
            assert!(!denied.contains(module.as_str()), "{module} is both allowed and denied");
        }
    }
}
