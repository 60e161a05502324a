//! Minimal Python tokenizer for screening.
//!
//! Only what the token walk needs: names, string literal bodies, punctuation,
//! logical newlines, and source lines. Single pass, no backtracking.
//!
//! Names are NFKC-normalized the way the interpreter normalizes identifiers,
//! and escape sequences in non-raw string literals are decoded, so the token
//! walk sees the text the interpreter will see.

use std::fmt;
use unicode_normalization::UnicodeNormalization;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier after NFKC normalization
    Name(String),
    /// String literal body, prefix and quotes removed, escapes decoded
    Str(String),
    Number,
    Op(char),
    /// End of a logical line (outside brackets)
    Newline,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

impl Token {
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Name(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_op(&self, c: char) -> bool {
        self.kind == TokenKind::Op(c)
    }

    pub fn is_name(&self, expected: &str) -> bool {
        self.name() == Some(expected)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LexError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for LexError {}

fn is_string_prefix(ident: &str) -> bool {
    matches!(
        ident.to_ascii_lowercase().as_str(),
        "r" | "b" | "u" | "f" | "rb" | "br" | "fr" | "rf"
    )
}

// Any non-ASCII character may belong to an identifier; the interpreter
// validates it only after normalization.
fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic() || (!c.is_ascii() && !c.is_whitespace())
}

fn is_ident_continue(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

fn normalize_identifier(ident: String) -> String {
    if ident.is_ascii() {
        ident
    } else {
        ident.nfkc().collect()
    }
}

/// Resolve the `\N{...}` names that can spell screened text. Anything else
/// stays undecoded.
fn named_char(name: &str) -> Option<char> {
    let name = name.trim().to_ascii_uppercase();
    let single = |rest: &str| {
        let mut chars = rest.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    };

    if let Some(rest) = name.strip_prefix("LATIN SMALL LETTER ") {
        return single(rest).filter(char::is_ascii_uppercase).map(|c| c.to_ascii_lowercase());
    }
    if let Some(rest) = name.strip_prefix("LATIN CAPITAL LETTER ") {
        return single(rest).filter(char::is_ascii_uppercase);
    }
    if let Some(rest) = name.strip_prefix("DIGIT ") {
        const DIGITS: [&str; 10] = [
            "ZERO", "ONE", "TWO", "THREE", "FOUR", "FIVE", "SIX", "SEVEN", "EIGHT", "NINE",
        ];
        return DIGITS
            .iter()
            .position(|d| *d == rest)
            .and_then(|n| char::from_digit(n as u32, 10));
    }

    match name.as_str() {
        "LOW LINE" => Some('_'),
        "SPACE" | "SP" => Some(' '),
        "FULL STOP" => Some('.'),
        "COMMA" => Some(','),
        "LEFT PARENTHESIS" => Some('('),
        "RIGHT PARENTHESIS" => Some(')'),
        "LEFT SQUARE BRACKET" => Some('['),
        "RIGHT SQUARE BRACKET" => Some(']'),
        "APOSTROPHE" => Some('\''),
        "QUOTATION MARK" => Some('"'),
        _ => None,
    }
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    brackets: Vec<(char, usize)>,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            brackets: Vec::new(),
            tokens: Vec::new(),
        }
    }

    fn push(&mut self, kind: TokenKind, line: usize) {
        self.tokens.push(Token { kind, line });
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        while let Some(c) = self.chars.next() {
            match c {
                '\n' => {
                    if self.brackets.is_empty()
                        && !matches!(self.tokens.last(), None | Some(Token { kind: TokenKind::Newline, .. }))
                    {
                        self.push(TokenKind::Newline, self.line);
                    }
                    self.line += 1;
                }
                '#' => {
                    while let Some(&next) = self.chars.peek() {
                        if next == '\n' {
                            break;
                        }
                        self.chars.next();
                    }
                }
                '\\' => {
                    // Line continuation; a stray backslash is left for the interpreter.
                    if self.chars.peek() == Some(&'\n') {
                        self.chars.next();
                        self.line += 1;
                    }
                }
                '\'' | '"' => self.string(c, false)?,
                c if c.is_whitespace() => {}
                c if is_ident_start(c) => {
                    let start_line = self.line;
                    let mut ident = String::from(c);
                    while let Some(&next) = self.chars.peek() {
                        if !is_ident_continue(next) {
                            break;
                        }
                        ident.push(next);
                        self.chars.next();
                    }

                    match self.chars.peek() {
                        Some(&q) if (q == '\'' || q == '"') && is_string_prefix(&ident) => {
                            self.chars.next();
                            let raw = ident.to_ascii_lowercase().contains('r');
                            self.string(q, raw)?;
                        }
                        _ => self.push(TokenKind::Name(normalize_identifier(ident)), start_line),
                    }
                }
                c if c.is_ascii_digit() => {
                    while let Some(&next) = self.chars.peek() {
                        if !(next.is_ascii_alphanumeric() || next == '_' || next == '.') {
                            break;
                        }
                        self.chars.next();
                    }
                    self.push(TokenKind::Number, self.line);
                }
                '(' | '[' | '{' => {
                    self.brackets.push((c, self.line));
                    self.push(TokenKind::Op(c), self.line);
                }
                ')' | ']' | '}' => {
                    let expected = match c {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    match self.brackets.pop() {
                        Some((open, _)) if open == expected => {}
                        _ => {
                            return Err(LexError {
                                line: self.line,
                                message: format!("unmatched '{}'", c),
                            })
                        }
                    }
                    self.push(TokenKind::Op(c), self.line);
                }
                other => self.push(TokenKind::Op(other), self.line),
            }
        }

        if let Some((open, line)) = self.brackets.last() {
            return Err(LexError {
                line: *line,
                message: format!("'{}' was never closed", open),
            });
        }

        Ok(self.tokens)
    }

    fn string(&mut self, quote: char, raw: bool) -> Result<(), LexError> {
        let start_line = self.line;
        let triple = {
            let mut lookahead = self.chars.clone();
            lookahead.next() == Some(quote) && lookahead.next() == Some(quote)
        };
        if triple {
            self.chars.next();
            self.chars.next();
        } else if self.chars.peek() == Some(&quote) {
            // Empty string literal.
            self.chars.next();
            self.push(TokenKind::Str(String::new()), start_line);
            return Ok(());
        }

        let mut body = String::new();
        let mut closing_run = 0usize;

        loop {
            let Some(c) = self.chars.next() else {
                return Err(LexError {
                    line: start_line,
                    message: "unterminated string literal".to_string(),
                });
            };

            if c == '\n' {
                self.line += 1;
                if !triple {
                    return Err(LexError {
                        line: start_line,
                        message: "unterminated string literal".to_string(),
                    });
                }
            }

            if c == '\\' {
                closing_run = 0;
                if raw {
                    if let Some(escaped) = self.chars.next() {
                        if escaped == '\n' {
                            self.line += 1;
                        }
                        body.push('\\');
                        body.push(escaped);
                    }
                } else {
                    self.escape(&mut body);
                }
                continue;
            }

            if c == quote {
                if !triple {
                    break;
                }
                closing_run += 1;
                if closing_run == 3 {
                    body.truncate(body.len() - 2);
                    break;
                }
                body.push(c);
                continue;
            }

            closing_run = 0;
            body.push(c);
        }

        self.push(TokenKind::Str(body), start_line);
        Ok(())
    }

    /// Decode one escape sequence after a backslash. Unknown escapes keep the
    /// backslash, as the interpreter does.
    fn escape(&mut self, body: &mut String) {
        let Some(c) = self.chars.next() else {
            return;
        };
        match c {
            '\n' => self.line += 1,
            'n' => body.push('\n'),
            't' => body.push('\t'),
            'r' => body.push('\r'),
            'a' => body.push('\u{07}'),
            'b' => body.push('\u{08}'),
            'f' => body.push('\u{0c}'),
            'v' => body.push('\u{0b}'),
            '\\' | '\'' | '"' => body.push(c),
            'x' => self.numeric_escape(body, 2, 16, 0),
            'u' => self.numeric_escape(body, 4, 16, 0),
            'U' => self.numeric_escape(body, 8, 16, 0),
            '0'..='7' => self.numeric_escape(body, 2, 8, c.to_digit(8).unwrap_or(0)),
            'N' if self.chars.peek() == Some(&'{') => {
                self.chars.next();
                let mut name = String::new();
                while let Some(&next) = self.chars.peek() {
                    if next == '}' || next == '\n' || name.len() > 128 {
                        break;
                    }
                    name.push(next);
                    self.chars.next();
                }
                let closed = self.chars.peek() == Some(&'}');
                if closed {
                    self.chars.next();
                }
                match named_char(&name).filter(|_| closed) {
                    Some(decoded) => body.push(decoded),
                    None => {
                        body.push_str("\\N{");
                        body.push_str(&name);
                        if closed {
                            body.push('}');
                        }
                    }
                }
            }
            other => {
                body.push('\\');
                body.push(other);
            }
        }
    }

    /// Read up to `max_digits` digits in `radix` on top of `value` and push
    /// the resulting character.
    fn numeric_escape(&mut self, body: &mut String, max_digits: usize, radix: u32, mut value: u32) {
        for _ in 0..max_digits {
            let Some(digit) = self.chars.peek().and_then(|c| c.to_digit(radix)) else {
                break;
            };
            value = value.saturating_mul(radix).saturating_add(digit);
            self.chars.next();
        }
        if let Some(decoded) = char::from_u32(value) {
            body.push(decoded);
        }
    }
}

/// Tokenize Python source. Fails on unterminated strings and unbalanced brackets.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).run()
}
