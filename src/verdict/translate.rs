/// Interpreter error translation
///
/// Turns the stderr of a failed harness run into one plain-language line.
use crate::utils::output::truncate_chars;

/// Longest raw line carried into a message
pub const MAX_RAW_CHARS: usize = 200;

/// Parsed final line of a Python traceback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterError {
    pub kind: String,
    pub detail: String,
    /// Line in the submission, when a frame points into it
    pub line: Option<usize>,
}

static EXPLANATIONS: &[(&[&str], &str)] = &[
    (
        &["SyntaxError", "IndentationError", "TabError"],
        "Syntax error: the code could not be parsed",
    ),
    (
        &["NameError", "UnboundLocalError"],
        "Name error: a variable or function was used before it was defined",
    ),
    (
        &["TypeError"],
        "Type error: an operation was applied to a value of the wrong type",
    ),
    (
        &["IndexError"],
        "Index error: a sequence index was out of range",
    ),
    (
        &["KeyError"],
        "Key error: a dictionary key was not found",
    ),
    (
        &["ZeroDivisionError"],
        "Division by zero",
    ),
    (
        &["RecursionError"],
        "Recursion error: maximum recursion depth exceeded, check the base case",
    ),
    (
        &["AttributeError"],
        "Attribute error: the object has no such attribute or method",
    ),
    (
        &["ValueError"],
        "Value error: a function received an argument with the right type but an invalid value",
    ),
    (
        &["MemoryError"],
        "Memory error: the submission ran out of memory",
    ),
    (
        &["ImportError", "ModuleNotFoundError"],
        "Import error: the module is not available in the sandbox",
    ),
];

/// Find the exception line and the innermost submission frame in `stderr`.
pub fn parse_traceback(stderr: &str) -> Option<InterpreterError> {
    let mut line = None;
    let mut last = None;

    for raw in stderr.lines() {
        let text = raw.trim();
        if text.is_empty() {
            continue;
        }
        if let Some(n) = frame_line(text) {
            line = Some(n);
            continue;
        }
        if let Some((kind, detail)) = exception_line(text) {
            last = Some((kind.to_string(), detail.to_string()));
        }
    }

    last.map(|(kind, detail)| InterpreterError { kind, detail, line })
}

/// `File "solution.py", line 7, in solve` -> 7
fn frame_line(text: &str) -> Option<usize> {
    let rest = text.strip_prefix("File \"solution.py\", line ")?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// `ValueError: bad` -> ("ValueError", "bad"); also accepts dotted names.
fn exception_line(text: &str) -> Option<(&str, &str)> {
    let (kind, detail) = match text.split_once(':') {
        Some((kind, detail)) => (kind, detail.trim()),
        None => (text, ""),
    };
    let name = kind.rsplit('.').next().unwrap_or(kind);
    let is_exception = !name.is_empty()
        && name.chars().all(|c| c == '_' || c.is_ascii_alphanumeric())
        && name.starts_with(|c: char| c.is_ascii_uppercase())
        && (name.ends_with("Error") || name.ends_with("Exception") || name.ends_with("Interrupt"));
    if is_exception {
        Some((name, detail))
    } else {
        None
    }
}

/// User-facing message for a harness run that exited with `exit_code`.
pub fn translate(stderr: &str, exit_code: i32) -> String {
    if let Some(error) = parse_traceback(stderr) {
        return describe(&error);
    }

    match stderr.lines().map(str::trim).find(|l| !l.is_empty()) {
        Some(first) => truncate_chars(first, MAX_RAW_CHARS),
        None => format!("Execution failed with exit code {}", exit_code),
    }
}

pub fn describe(error: &InterpreterError) -> String {
    let explanation = EXPLANATIONS
        .iter()
        .find(|(kinds, _)| kinds.contains(&error.kind.as_str()))
        .map(|(_, text)| *text);

    let mut message = match explanation {
        Some(text) => text.to_string(),
        None => format!("Runtime error ({})", error.kind),
    };
    if let Some(line) = error.line {
        message.push_str(&format!(" (line {})", line));
    }
    if !error.detail.is_empty() {
        message.push_str(": ");
        message.push_str(&truncate_chars(&error.detail, MAX_RAW_CHARS));
    }
    message
}
