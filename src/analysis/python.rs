//! Token walk over Python source.

use crate::analysis::denylist::{self, DANGEROUS_DUNDERS, PYTHON_BARE_REFERENCES, SAFE_DUNDERS};
use crate::analysis::lexer::{Token, TokenKind};
use crate::analysis::ViolationSink;
use crate::config::types::SecurityConfig;
use crate::core::types::{Violation, ViolationCategory};
use std::collections::HashSet;

/// Deny-lists resolved against one configuration.
#[derive(Debug, Clone)]
pub struct PythonRules {
    modules: HashSet<&'static str>,
    calls: HashSet<&'static str>,
    attribute_calls: HashSet<&'static str>,
    string_patterns: Vec<&'static str>,
}

impl PythonRules {
    pub fn from_config(config: &SecurityConfig) -> Self {
        Self {
            modules: denylist::active_set(denylist::PYTHON_MODULES, config),
            calls: denylist::active_set(denylist::PYTHON_CALLS, config),
            attribute_calls: denylist::active_set(denylist::PYTHON_ATTRIBUTE_CALLS, config),
            string_patterns: denylist::active(denylist::PYTHON_STRING_PATTERNS, config),
        }
    }

    pub fn denies_module(&self, dotted: &str) -> bool {
        let root = dotted.split('.').next().unwrap_or(dotted);
        self.modules.contains(root)
    }
}

fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

fn at_statement_start(prev: Option<&Token>) -> bool {
    match prev {
        None => true,
        Some(tok) => tok.kind == TokenKind::Newline || tok.is_op(';') || tok.is_op(':'),
    }
}

/// Read a dotted name starting at `i`. Returns the name and the index after it.
fn dotted_name(tokens: &[Token], mut i: usize) -> Option<(String, usize)> {
    let mut name = tokens.get(i)?.name()?.to_string();
    i += 1;
    while tokens.get(i).map_or(false, |t| t.is_op('.')) {
        match tokens.get(i + 1).and_then(Token::name) {
            Some(part) => {
                name.push('.');
                name.push_str(part);
                i += 2;
            }
            None => break,
        }
    }
    Some((name, i))
}

fn end_of_statement(tokens: &[Token], mut i: usize) -> usize {
    while let Some(tok) = tokens.get(i) {
        if tok.kind == TokenKind::Newline || tok.is_op(';') {
            break;
        }
        i += 1;
    }
    i
}

fn import_violation(module: &str, line: usize) -> Violation {
    Violation::new(
        ViolationCategory::DisallowedImport,
        format!("Import of disallowed module '{}'", module),
    )
    .at_line(line)
}

/// `import a.b as c, d` starting after the keyword. Returns the next index.
fn check_import(tokens: &[Token], mut i: usize, rules: &PythonRules, sink: &mut ViolationSink) -> usize {
    loop {
        let Some((module, next)) = dotted_name(tokens, i) else {
            return i;
        };
        if rules.denies_module(&module) {
            sink.push(import_violation(&module, tokens[i].line));
        }
        i = next;

        if tokens.get(i).map_or(false, |t| t.is_name("as")) {
            i += 2;
        }
        if tokens.get(i).map_or(false, |t| t.is_op(',')) {
            i += 1;
            continue;
        }
        return i;
    }
}

/// `from X import ...` starting after the keyword. Relative imports are ignored.
fn check_from_import(tokens: &[Token], i: usize, rules: &PythonRules, sink: &mut ViolationSink) -> usize {
    if tokens.get(i).map_or(false, |t| t.is_op('.')) {
        return end_of_statement(tokens, i);
    }

    if let Some((module, _)) = dotted_name(tokens, i) {
        if rules.denies_module(&module) {
            sink.push(import_violation(&module, tokens[i].line));
        }
    }
    end_of_statement(tokens, i)
}

/// Walk the token stream and report every deny-listed construct.
pub fn walk(tokens: &[Token], rules: &PythonRules, sink: &mut ViolationSink) {
    let mut i = 0;

    while i < tokens.len() {
        let tok = &tokens[i];
        let prev = if i > 0 { tokens.get(i - 1) } else { None };
        let next = tokens.get(i + 1);

        match &tok.kind {
            TokenKind::Name(name) if name == "import" => {
                i = check_import(tokens, i + 1, rules, sink);
                continue;
            }
            TokenKind::Name(name) if name == "from" && at_statement_start(prev) => {
                i = check_from_import(tokens, i + 1, rules, sink);
                continue;
            }
            TokenKind::Name(name) => check_name(name, tok.line, prev, next, rules, sink),
            TokenKind::Str(body) => check_string(body, tok.line, rules, sink),
            _ => {}
        }

        i += 1;
    }
}

fn check_name(
    name: &str,
    line: usize,
    prev: Option<&Token>,
    next: Option<&Token>,
    rules: &PythonRules,
    sink: &mut ViolationSink,
) {
    let after_dot = prev.map_or(false, |t| t.is_op('.'));
    let is_definition = prev.map_or(false, |t| t.is_name("def") || t.is_name("class"));
    let is_call = next.map_or(false, |t| t.is_op('('));

    if is_definition {
        return;
    }

    if is_call {
        if after_dot && rules.attribute_calls.contains(name) {
            sink.push(
                Violation::new(
                    ViolationCategory::DisallowedCall,
                    format!("Call to disallowed method '.{}()'", name),
                )
                .at_line(line),
            );
        } else if !after_dot && rules.calls.contains(name) {
            sink.push(
                Violation::new(
                    ViolationCategory::DisallowedCall,
                    format!("Call to disallowed function '{}()'", name),
                )
                .at_line(line),
            );
        }
    } else if !after_dot && PYTHON_BARE_REFERENCES.contains(&name) {
        sink.push(
            Violation::new(
                ViolationCategory::DisallowedCall,
                format!("Reference to disallowed builtin '{}'", name),
            )
            .at_line(line),
        );
    }

    if is_dunder(name) {
        if after_dot && !SAFE_DUNDERS.contains(&name) {
            sink.push(
                Violation::new(
                    ViolationCategory::DunderAccess,
                    format!("Access to dunder attribute '.{}'", name),
                )
                .at_line(line),
            );
        } else if !after_dot && DANGEROUS_DUNDERS.contains(&name) {
            sink.push(
                Violation::new(
                    ViolationCategory::DunderAccess,
                    format!("Reference to introspection name '{}'", name),
                )
                .at_line(line),
            );
        }
    }
}

fn check_string(body: &str, line: usize, rules: &PythonRules, sink: &mut ViolationSink) {
    let lowered = body.to_ascii_lowercase();
    for pattern in &rules.string_patterns {
        if lowered.contains(pattern) {
            sink.push(
                Violation::new(
                    ViolationCategory::SuspiciousString,
                    format!("Suspicious string content '{}'", pattern),
                )
                .at_line(line),
            );
        }
    }
}
