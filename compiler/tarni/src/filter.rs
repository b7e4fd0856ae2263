//! Which files of a package directory take part in a build.
//!
//! Two independent checks, applied in order by the driver:
//!
//! - [`eligible`] looks only at the file name: extension, ignored
//!   prefixes, test files and `_<os>` / `_<arch>` / `_<os>_<arch>`
//!   suffixes.
//! - [`constraints_satisfied`] looks at the build constraints in the
//!   file's leading comments: a `//tarn:build <expr>` line, or the legacy
//!   `// +build` lines when no `//tarn:build` line is present.

use tarn_ir::SOURCE_EXT;
use thiserror::Error;

use crate::options::{BuildContext, KNOWN_ARCH, KNOWN_OS};

const TEST_SUFFIX: &str = "_test";
const BUILD_PREFIX: &str = "//tarn:build";
const LEGACY_PREFIX: &str = "// +build";

/// A `//tarn:build` expression that does not parse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConstraintError {
    #[error("empty build constraint")]
    Empty,
    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),
    #[error("unexpected {token}")]
    UnexpectedToken { token: String },
    #[error("missing )")]
    MissingClose,
    #[error("unexpected end of constraint")]
    UnexpectedEnd,
}

impl ConstraintError {
    #[cold]
    fn unexpected_char(c: u8) -> Self {
        ConstraintError::UnexpectedChar(char::from(c))
    }

    #[cold]
    fn unexpected(token: Token<'_>) -> Self {
        let token = match token {
            Token::Tag(tag) => format!("tag {tag}"),
            Token::Or => "||".to_string(),
            Token::And => "&&".to_string(),
            Token::Not => "!".to_string(),
            Token::Open => "(".to_string(),
            Token::Close => ")".to_string(),
        };
        ConstraintError::UnexpectedToken { token }
    }
}

/// Whether a directory entry named `name` is a source file of the build.
pub fn eligible(name: &str, build: &BuildContext, skip_test: bool) -> bool {
    if name.starts_with('_') || name.starts_with('.') {
        return false;
    }
    let Some(stem) = name
        .strip_suffix(SOURCE_EXT)
        .and_then(|s| s.strip_suffix('.'))
    else {
        return false;
    };
    let stem = match stem.strip_suffix(TEST_SUFFIX) {
        Some(_) if skip_test => return false,
        Some(rest) => rest,
        None => stem,
    };

    let parts: Vec<&str> = stem.split('_').collect();
    let n = parts.len();
    if n >= 3 && KNOWN_OS.contains(&parts[n - 2]) && KNOWN_ARCH.contains(&parts[n - 1]) {
        return parts[n - 2] == build.os && parts[n - 1] == build.arch;
    }
    if n >= 2 {
        let last = parts[n - 1];
        if KNOWN_OS.contains(&last) {
            return last == build.os;
        }
        if KNOWN_ARCH.contains(&last) {
            return last == build.arch;
        }
    }
    true
}

/// Evaluate the build constraints of `source` against `build`.
///
/// Only the comment block before the first line of code is inspected.
pub fn constraints_satisfied(
    source: &str,
    build: &BuildContext,
) -> Result<bool, ConstraintError> {
    let mut expression = None;
    let mut legacy = Vec::new();
    let mut in_block = false;

    for line in source.lines() {
        let line = line.trim();
        if in_block {
            in_block = !line.contains("*/");
            continue;
        }
        if line.is_empty() {
            continue;
        }
        if line.starts_with("/*") {
            in_block = !line[2..].contains("*/");
            continue;
        }
        if !line.starts_with("//") {
            break;
        }
        if let Some(rest) = line.strip_prefix(BUILD_PREFIX) {
            let separated = rest.is_empty() || rest.starts_with(char::is_whitespace);
            if separated && expression.is_none() {
                expression = Some(rest.trim());
            }
        } else if let Some(rest) = line.strip_prefix(LEGACY_PREFIX) {
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                legacy.push(rest.trim());
            }
        }
    }

    if let Some(expression) = expression {
        return ConstraintParser::new(expression, build).parse();
    }
    Ok(legacy.iter().all(|line| legacy_line(line, build)))
}

/// `// +build a,b !c`: space-separated options are ORed, comma-separated
/// terms ANDed.
fn legacy_line(line: &str, build: &BuildContext) -> bool {
    line.split_whitespace().any(|option| {
        option.split(',').all(|term| match term.strip_prefix('!') {
            Some(tag) => !build.matches_tag(tag),
            None => build.matches_tag(term),
        })
    })
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Token<'a> {
    Tag(&'a str),
    Or,
    And,
    Not,
    Open,
    Close,
}

/// Recursive descent over `||`, `&&`, `!`, parentheses and tags.
struct ConstraintParser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    build: &'a BuildContext,
    error: Option<ConstraintError>,
}

impl<'a> ConstraintParser<'a> {
    fn new(source: &'a str, build: &'a BuildContext) -> Self {
        let mut parser = ConstraintParser {
            tokens: Vec::new(),
            pos: 0,
            build,
            error: None,
        };
        parser.tokenize(source);
        parser
    }

    fn tokenize(&mut self, source: &'a str) {
        let bytes = source.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let rest = &source[i..];
            match bytes[i] {
                b' ' | b'\t' => i += 1,
                b'(' => {
                    self.tokens.push(Token::Open);
                    i += 1;
                }
                b')' => {
                    self.tokens.push(Token::Close);
                    i += 1;
                }
                b'!' => {
                    self.tokens.push(Token::Not);
                    i += 1;
                }
                _ if rest.starts_with("||") => {
                    self.tokens.push(Token::Or);
                    i += 2;
                }
                _ if rest.starts_with("&&") => {
                    self.tokens.push(Token::And);
                    i += 2;
                }
                c if is_tag_byte(c) => {
                    let len = rest.bytes().take_while(|b| is_tag_byte(*b)).count();
                    self.tokens.push(Token::Tag(&rest[..len]));
                    i += len;
                }
                c => {
                    self.fail(ConstraintError::unexpected_char(c));
                    return;
                }
            }
        }
    }

    fn fail(&mut self, error: ConstraintError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn parse(mut self) -> Result<bool, ConstraintError> {
        if self.tokens.is_empty() && self.error.is_none() {
            self.fail(ConstraintError::Empty);
        }
        let value = self.or();
        if let Some(token) = self.peek() {
            self.fail(ConstraintError::unexpected(token));
        }
        match self.error {
            Some(error) => Err(error),
            None => Ok(value),
        }
    }

    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn or(&mut self) -> bool {
        let mut value = self.and();
        while self.peek() == Some(Token::Or) {
            self.pos += 1;
            let rhs = self.and();
            value = value || rhs;
        }
        value
    }

    fn and(&mut self) -> bool {
        let mut value = self.not();
        while self.peek() == Some(Token::And) {
            self.pos += 1;
            let rhs = self.not();
            value = value && rhs;
        }
        value
    }

    fn not(&mut self) -> bool {
        match self.peek() {
            Some(Token::Not) => {
                self.pos += 1;
                !self.not()
            }
            Some(Token::Open) => {
                self.pos += 1;
                let value = self.or();
                if self.peek() == Some(Token::Close) {
                    self.pos += 1;
                } else {
                    self.fail(ConstraintError::MissingClose);
                }
                value
            }
            Some(Token::Tag(tag)) => {
                self.pos += 1;
                self.build.matches_tag(tag)
            }
            Some(other) => {
                self.fail(ConstraintError::unexpected(other));
                self.pos = self.tokens.len();
                false
            }
            None => {
                self.fail(ConstraintError::UnexpectedEnd);
                false
            }
        }
    }
}

fn is_tag_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.'
}
