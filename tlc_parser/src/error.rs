//! Lexer and parser error types.

use crate::span::Span;
use thiserror::Error;

/// A lexical error, always attached to the span of the offending bytes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    #[error("unexpected character '{found}'")]
    UnexpectedChar { found: char, span: Span },

    #[error("unterminated string literal")]
    UnterminatedString { span: Span },

    #[error("unterminated block comment")]
    UnterminatedBlockComment { span: Span },

    #[error("malformed exponent in numeric literal '{literal}'")]
    MalformedExponent { literal: String, span: Span },
}

impl Default for LexError {
    /// The placeholder logos substitutes when no token matches at all; the
    /// lexer wrapper immediately replaces it with the real offending
    /// character and span before handing the error to the caller.
    fn default() -> Self {
        LexError::UnexpectedChar {
            found: '\0',
            span: Span::dummy(),
        }
    }
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedChar { span, .. }
            | LexError::UnterminatedString { span, .. }
            | LexError::UnterminatedBlockComment { span, .. }
            | LexError::MalformedExponent { span, .. } => *span,
        }
    }

    /// A short, targeted suggestion string shown alongside the diagnostic.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            LexError::UnexpectedChar { found, .. } => {
                Some(format!("remove or replace the character '{found}'"))
            }
            LexError::UnterminatedString { .. } => Some("add a closing '\"'".to_string()),
            LexError::UnterminatedBlockComment { .. } => Some("add a closing '*/'".to_string()),
            LexError::MalformedExponent { .. } => {
                Some("write at least one digit after 'e'/'E' (optionally signed)".to_string())
            }
        }
    }
}

/// A syntax error raised by the parser.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected token '{found}', expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        span: Span,
    },

    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String, span: Span },

    #[error("{message}")]
    InvalidSyntax { message: String, span: Span },

    #[error(transparent)]
    Lex(#[from] LexError),
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedToken { span, .. }
            | ParseError::UnexpectedEof { span, .. }
            | ParseError::InvalidSyntax { span, .. } => *span,
            ParseError::Lex(e) => e.span(),
        }
    }

    pub fn suggestion(&self) -> Option<String> {
        match self {
            ParseError::UnexpectedToken { expected, .. } => {
                Some(format!("expected {expected} here"))
            }
            ParseError::UnexpectedEof { expected, .. } => {
                Some(format!("add {expected} before the end of the file"))
            }
            ParseError::InvalidSyntax { .. } => None,
            ParseError::Lex(e) => e.suggestion(),
        }
    }
}

pub type LexResult<T> = Result<T, LexError>;
pub type ParseResult<T> = Result<T, ParseError>;
