use std::iter::Peekable;
use std::vec::IntoIter; // To iterate over Vec<Token>

use thiserror::Error;

use crate::lexer::{LexerError, Token, TokenKind, tokenize};
use crate::source::Span;
use crate::statements::StatementTable;
use crate::types::{Node, Value};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Unexpected token '{found}', expected {expected}")]
    UnexpectedToken { found: Token, expected: String },
    #[error("Unexpected end of input, expected {0}")]
    UnexpectedEof(String),
    #[error("{0}")]
    Lexer(#[from] LexerError),
}

// Result type alias for convenience
type ParseResult<T> = Result<T, ParseError>;

/// Builds the typed AST from a token stream. Symbols are classified once,
/// here, against the statement table: recognized keywords become
/// `Statement` leaves, everything else a `Variable`. The classification is
/// permanent for the parsed text.
pub struct Parser<'a> {
    tokens: Peekable<IntoIter<Token>>,
    statements: &'a StatementTable,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, statements: &'a StatementTable) -> Self {
        Parser {
            tokens: tokens.into_iter().peekable(),
            statements,
        }
    }

    // Consumes the next token if available.
    fn next_token(&mut self) -> Option<Token> {
        self.tokens.next()
    }

    /// Parses every top-level form on the line and wraps them in one
    /// unquoted list, mirroring how the driver hands whole lines to the
    /// evaluator. A single form reduces through the evaluator's
    /// single-element rule; an empty line evaluates to nil.
    pub fn parse_line(mut self) -> ParseResult<Node> {
        let mut forms = Vec::new();
        while self.tokens.peek().is_some() {
            forms.push(self.parse_expr()?);
        }

        let span = match (forms.first(), forms.last()) {
            (Some(first), Some(last)) => first.span.merge(last.span),
            _ => Span::default(),
        };
        Ok(Node::new_list(forms, span))
    }

    fn parse_expr(&mut self) -> ParseResult<Node> {
        let token = self.next_token();
        self.parse_expr_with_token(token)
    }

    fn parse_expr_with_token(&mut self, token: Option<Token>) -> ParseResult<Node> {
        match token {
            Some(Token {
                kind: TokenKind::LParen,
                span,
            }) => self.parse_list(span, false),
            // The quote marker only has meaning glued to a list opener.
            Some(Token {
                kind: TokenKind::Quote,
                span,
            }) => match self.next_token() {
                Some(Token {
                    kind: TokenKind::LParen,
                    span: lparen_span,
                }) => self.parse_list(span.merge(lparen_span), true),
                Some(found) => Err(ParseError::UnexpectedToken {
                    found,
                    expected: "'(' after quote".to_string(),
                }),
                None => Err(ParseError::UnexpectedEof("'(' after quote".to_string())),
            },
            Some(atom) => self.parse_atom(atom),
            None => Err(ParseError::UnexpectedEof("an expression".to_string())),
        }
    }

    /// Parses list elements up to the matching ')'. Running out of tokens
    /// first is an unbalanced-paren error.
    fn parse_list(&mut self, start_span: Span, quoted: bool) -> ParseResult<Node> {
        let mut elements = Vec::new();
        loop {
            match self.next_token() {
                Some(Token {
                    kind: TokenKind::RParen,
                    span,
                }) => {
                    let span = start_span.merge(span);
                    return Ok(if quoted {
                        Node::new_quoted_list(elements, span)
                    } else {
                        Node::new_list(elements, span)
                    });
                }
                Some(token) => elements.push(self.parse_expr_with_token(Some(token))?),
                None => return Err(ParseError::UnexpectedEof("')'".to_string())),
            }
        }
    }

    /// Parses an atomic expression (int, float, string, symbol).
    fn parse_atom(&mut self, token: Token) -> ParseResult<Node> {
        let Token { kind, span } = token;
        let value = match kind {
            TokenKind::Int(n) => Value::Int(n),
            TokenKind::Float(n) => Value::Float(n),
            TokenKind::Str(s) => Value::Str(s),
            TokenKind::Symbol(s) => {
                if self.statements.contains(&s) {
                    Value::Statement(s)
                } else {
                    Value::Variable(s)
                }
            }
            other => {
                return Err(ParseError::UnexpectedToken {
                    found: Token { kind: other, span },
                    expected: "an atom or '('".to_string(),
                });
            }
        };
        Ok(Node::new(value, span))
    }
}

/// Helper to lex and parse one input line directly (driver, REPL, tests).
pub fn parse_line(input: &str, statements: &StatementTable) -> ParseResult<Node> {
    let tokens = tokenize(input)?;
    Parser::new(tokens, statements).parse_line()
}
