//! Lexer for Tarn using logos.
//!
//! Produces a flat token list with automatic semicolon insertion: a line
//! break becomes a `;` when the line's last token is an identifier, a
//! literal, `)`, `}`, `return`, `break`, `continue`, `++` or `--`.

use logos::Logos;
use tarn_ir::{LineIndex, Span};

use crate::ParseError;

/// Raw token from logos (before semicolon insertion).
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\f]+")]
enum RawToken {
    #[regex(r"//[^\n]*")]
    LineComment,
    #[regex(r"/\*([^*]|\*+[^*/])*\*+/")]
    BlockComment,
    #[token("\n")]
    Newline,

    // === Keywords ===
    #[token("package")]
    Package,
    #[token("import")]
    Import,
    #[token("var")]
    Var,
    #[token("const")]
    Const,
    #[token("type")]
    Type,
    #[token("func")]
    Func,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("return")]
    Return,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // === Literals ===
    #[regex("[A-Za-z_][A-Za-z0-9_]*")]
    Ident,
    #[regex("[0-9]+")]
    Int,
    #[regex(r#""([^"\\\n]|\\.)*""#)]
    Str,
    #[regex("`[^`]*`")]
    RawStr,

    // === Punctuation ===
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token(".")]
    Dot,
    #[token("=")]
    Assign,
    #[token(":=")]
    Define,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("/=")]
    SlashAssign,
    #[token("%=")]
    PercentAssign,
    #[token("++")]
    Inc,
    #[token("--")]
    Dec,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Bang,
}

/// Token kinds seen by the parser.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TokenKind {
    Package,
    Import,
    Var,
    Const,
    Type,
    Func,
    If,
    Else,
    For,
    Return,
    Break,
    Continue,
    True,
    False,
    Ident,
    Int,
    Str,
    RawStr,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semi,
    Dot,
    Assign,
    Define,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    Inc,
    Dec,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,
    Bang,
    Eof,
}

impl TokenKind {
    /// Description used in "expected X, found Y" messages.
    pub const fn describe(self) -> &'static str {
        match self {
            TokenKind::Package => "'package'",
            TokenKind::Import => "'import'",
            TokenKind::Var => "'var'",
            TokenKind::Const => "'const'",
            TokenKind::Type => "'type'",
            TokenKind::Func => "'func'",
            TokenKind::If => "'if'",
            TokenKind::Else => "'else'",
            TokenKind::For => "'for'",
            TokenKind::Return => "'return'",
            TokenKind::Break => "'break'",
            TokenKind::Continue => "'continue'",
            TokenKind::True => "'true'",
            TokenKind::False => "'false'",
            TokenKind::Ident => "identifier",
            TokenKind::Int => "integer literal",
            TokenKind::Str | TokenKind::RawStr => "string literal",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::Comma => "','",
            TokenKind::Semi => "';' or newline",
            TokenKind::Dot => "'.'",
            TokenKind::Assign => "'='",
            TokenKind::Define => "':='",
            TokenKind::PlusAssign => "'+='",
            TokenKind::MinusAssign => "'-='",
            TokenKind::StarAssign => "'*='",
            TokenKind::SlashAssign => "'/='",
            TokenKind::PercentAssign => "'%='",
            TokenKind::Inc => "'++'",
            TokenKind::Dec => "'--'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::EqEq => "'=='",
            TokenKind::NotEq => "'!='",
            TokenKind::Lt => "'<'",
            TokenKind::LtEq => "'<='",
            TokenKind::Gt => "'>'",
            TokenKind::GtEq => "'>='",
            TokenKind::AndAnd => "'&&'",
            TokenKind::OrOr => "'||'",
            TokenKind::Bang => "'!'",
            TokenKind::Eof => "end of file",
        }
    }

    /// Whether a line break after this token terminates a statement.
    const fn ends_statement(self) -> bool {
        matches!(
            self,
            TokenKind::Ident
                | TokenKind::Int
                | TokenKind::Str
                | TokenKind::RawStr
                | TokenKind::True
                | TokenKind::False
                | TokenKind::RParen
                | TokenKind::RBrace
                | TokenKind::Return
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Inc
                | TokenKind::Dec
        )
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

fn convert(raw: RawToken) -> Option<TokenKind> {
    let kind = match raw {
        RawToken::LineComment | RawToken::BlockComment | RawToken::Newline => return None,
        RawToken::Package => TokenKind::Package,
        RawToken::Import => TokenKind::Import,
        RawToken::Var => TokenKind::Var,
        RawToken::Const => TokenKind::Const,
        RawToken::Type => TokenKind::Type,
        RawToken::Func => TokenKind::Func,
        RawToken::If => TokenKind::If,
        RawToken::Else => TokenKind::Else,
        RawToken::For => TokenKind::For,
        RawToken::Return => TokenKind::Return,
        RawToken::Break => TokenKind::Break,
        RawToken::Continue => TokenKind::Continue,
        RawToken::True => TokenKind::True,
        RawToken::False => TokenKind::False,
        RawToken::Ident => TokenKind::Ident,
        RawToken::Int => TokenKind::Int,
        RawToken::Str => TokenKind::Str,
        RawToken::RawStr => TokenKind::RawStr,
        RawToken::LParen => TokenKind::LParen,
        RawToken::RParen => TokenKind::RParen,
        RawToken::LBrace => TokenKind::LBrace,
        RawToken::RBrace => TokenKind::RBrace,
        RawToken::Comma => TokenKind::Comma,
        RawToken::Semi => TokenKind::Semi,
        RawToken::Dot => TokenKind::Dot,
        RawToken::Assign => TokenKind::Assign,
        RawToken::Define => TokenKind::Define,
        RawToken::PlusAssign => TokenKind::PlusAssign,
        RawToken::MinusAssign => TokenKind::MinusAssign,
        RawToken::StarAssign => TokenKind::StarAssign,
        RawToken::SlashAssign => TokenKind::SlashAssign,
        RawToken::PercentAssign => TokenKind::PercentAssign,
        RawToken::Inc => TokenKind::Inc,
        RawToken::Dec => TokenKind::Dec,
        RawToken::Plus => TokenKind::Plus,
        RawToken::Minus => TokenKind::Minus,
        RawToken::Star => TokenKind::Star,
        RawToken::Slash => TokenKind::Slash,
        RawToken::Percent => TokenKind::Percent,
        RawToken::EqEq => TokenKind::EqEq,
        RawToken::NotEq => TokenKind::NotEq,
        RawToken::Lt => TokenKind::Lt,
        RawToken::LtEq => TokenKind::LtEq,
        RawToken::Gt => TokenKind::Gt,
        RawToken::GtEq => TokenKind::GtEq,
        RawToken::AndAnd => TokenKind::AndAnd,
        RawToken::OrOr => TokenKind::OrOr,
        RawToken::Bang => TokenKind::Bang,
    };
    Some(kind)
}

/// Tokenize `source`, ending with an `Eof` token.
pub fn lex(source: &str, file_name: &str, lines: &LineIndex) -> Result<Vec<Token>, ParseError> {
    let mut tokens: Vec<Token> = Vec::with_capacity(source.len() / 4);
    let mut lexer = RawToken::lexer(source);

    let insert_semi = |tokens: &mut Vec<Token>, at: usize| {
        if tokens.last().is_some_and(|t| t.kind.ends_statement()) {
            tokens.push(Token {
                kind: TokenKind::Semi,
                span: Span::from_range(at..at),
            });
        }
    };

    while let Some(result) = lexer.next() {
        let range = lexer.span();
        let span = Span::from_range(range.clone());
        let Ok(raw) = result else {
            let ch = lexer.slice().chars().next().unwrap_or('\u{fffd}');
            return Err(ParseError::new(
                file_name,
                lines.span_start(span),
                format!("invalid character {ch:?}"),
            ));
        };
        match raw {
            RawToken::Newline => insert_semi(&mut tokens, range.start),
            RawToken::BlockComment if lexer.slice().contains('\n') => {
                insert_semi(&mut tokens, range.start);
            }
            _ => {
                if let Some(kind) = convert(raw) {
                    tokens.push(Token { kind, span });
                }
            }
        }
    }

    insert_semi(&mut tokens, source.len());
    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span::from_range(source.len()..source.len()),
    });

    tracing::trace!(file = file_name, count = tokens.len(), "lexed");
    Ok(tokens)
}

/// Decode the body of a `"..."` literal (quotes included in `raw`).
pub fn unescape(raw: &str) -> Result<String, String> {
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('0') => out.push('\0'),
            Some(other) => return Err(format!("unknown escape sequence \\{other}")),
            None => return Err("unterminated escape sequence".to_string()),
        }
    }
    Ok(out)
}
