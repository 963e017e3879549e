use logos::Logos;
use std::fmt;
use thiserror::Error;

use crate::source::Span;

/// Token-level syntax. Numeric literals are strict: the whole token must
/// parse, otherwise the longest-match rule hands it to `Symbol` (so `1-2`
/// or `1.2.3` are symbols, not malformed numbers).
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")] // Skip whitespace
#[logos(skip r";[^\n\r]*")] // Skip comments
#[logos(error = LexerErrorKind)]
pub enum TokenKind {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("'")]
    Quote,
    // Ties against Symbol (same length) must resolve to the numeric kinds.
    #[regex(r"[+-]?[0-9]+", |lex| {
        let slice = lex.slice();
        slice
            .parse::<i64>()
            .map_err(|_| LexerErrorKind::IntegerOutOfRange(slice.to_string()))
    }, priority = 5)]
    Int(i64),
    #[regex(r"[+-]?(?:[0-9]+\.[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?", |lex| {
        let slice = lex.slice();
        slice
            .parse::<f64>()
            .map_err(|_| LexerErrorKind::InvalidFloatFormat(slice.to_string()))
    }, priority = 5)]
    #[regex(r"[+-]?[0-9]+[eE][+-]?[0-9]+", |lex| {
        let slice = lex.slice();
        slice
            .parse::<f64>()
            .map_err(|_| LexerErrorKind::InvalidFloatFormat(slice.to_string()))
    }, priority = 5)]
    Float(f64),
    // Contents run verbatim to the next '"'. There is no escape syntax, so
    // a quote inside a literal ends it early.
    #[regex(r#""[^"]*"?"#, |lex| {
        let slice = lex.slice();
        if slice.len() < 2 || !slice.ends_with('"') {
            return Err(LexerErrorKind::UnterminatedString);
        }
        Ok(slice[1..slice.len() - 1].to_string())
    })]
    Str(String),
    #[regex(r#"[^ \t\n\r()'";]+"#, |lex| lex.slice().to_string())]
    Symbol(String),
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Quote => write!(f, "'"),
            TokenKind::Int(n) => write!(f, "{}", n),
            TokenKind::Float(n) => write!(f, "{}", n),
            TokenKind::Str(s) => write!(f, "\"{}\"", s), // Display with quotes for clarity
            TokenKind::Symbol(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

#[derive(Default, Debug, Clone, PartialEq, Error)]
pub enum LexerErrorKind {
    #[error("Unterminated string literal")]
    UnterminatedString,
    #[error("Integer literal out of range: '{0}'")]
    IntegerOutOfRange(String),
    #[error("Invalid float format: '{0}'")]
    InvalidFloatFormat(String),
    #[default]
    #[error("Invalid token")]
    InvalidToken,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error}")]
pub struct LexerError {
    pub error: LexerErrorKind,
    pub span: Span,
}

/// Tokenizes a whole input line, failing on the first malformed literal.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexerError> {
    TokenKind::lexer(input)
        .spanned()
        .map(|(result, range)| match result {
            Ok(kind) => Ok(Token {
                kind,
                span: Span::new(range.start, range.end),
            }),
            Err(error) => Err(LexerError {
                error,
                span: Span::new(range.start, range.end),
            }),
        })
        .collect()
}
