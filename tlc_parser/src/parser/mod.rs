//! Recursive-descent parser for TL.
//!
//! Builds an [`ast::Program`] directly rather than going through an
//! intermediate concrete syntax tree. The parser never returns `Err` to its
//! caller: lexical and syntactic errors are recorded on a [`Diagnostics`]
//! sink and the parser recovers in panic mode, so [`Parser::parse`] always
//! hands back a (possibly partial) program alongside whatever it collected.

mod expressions;
mod statements;

use crate::ast::Program;
use crate::diagnostics::Diagnostics;
use crate::lexer::{Lexer, SpannedToken};
use crate::span::Span;
use crate::token::Token;

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: SpannedToken,
    file: String,
    diagnostics: Diagnostics,
    consecutive_errors: usize,
}

/// Above this many consecutive errors the parser gives up trying to
/// resynchronize at statement boundaries and just drains tokens to EOF, so
/// a badly malformed file fails fast instead of spraying diagnostics.
const MAX_CONSECUTIVE_ERRORS: usize = 10;

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, file: impl Into<String>, emit_warnings: bool) -> Self {
        let file = file.into();
        let mut lexer = Lexer::new(source);
        let mut diagnostics = Diagnostics::new(emit_warnings);
        let current = Self::pull_valid_token(&mut lexer, &mut diagnostics, &file);
        Self {
            lexer,
            current,
            file,
            diagnostics,
            consecutive_errors: 0,
        }
    }

    /// Parse the whole file into a [`Program`], consuming the parser.
    /// Returns the diagnostics collected along the way; the caller decides
    /// whether to proceed past this phase via `Diagnostics::has_errors`.
    pub fn parse(mut self) -> (Program, Diagnostics) {
        let mut program = Program::new();

        while !self.at_eof() {
            match self.parse_top_level_item(&mut program) {
                Ok(()) => {
                    self.consecutive_errors = 0;
                }
                Err(err) => {
                    self.diagnostics.add_parse_error(&err, self.file.clone());
                    self.consecutive_errors += 1;
                    if self.consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        self.drain_to_eof();
                        break;
                    }
                    self.synchronize();
                }
            }
        }

        (program, self.diagnostics)
    }

    // ==================== Token management ====================

    /// Pull tokens from the lexer until one is `Ok`, recording every
    /// `LexError` along the way. The parser never sees a lex error
    /// directly — only the tokens that survive it.
    fn pull_valid_token(lexer: &mut Lexer<'_>, diagnostics: &mut Diagnostics, file: &str) -> SpannedToken {
        loop {
            match lexer.next_token() {
                Ok(tok) => return tok,
                Err(err) => diagnostics.add_lex_error(&err, file.to_string()),
            }
        }
    }

    fn advance(&mut self) -> SpannedToken {
        let next = Self::pull_valid_token(&mut self.lexer, &mut self.diagnostics, &self.file);
        std::mem::replace(&mut self.current, next)
    }

    fn check(&self, token: &Token) -> bool {
        &self.current.token == token
    }

    fn at_eof(&self) -> bool {
        self.current.token == Token::Eof
    }

    fn current_span(&self) -> Span {
        self.current.span
    }

    /// Consume the current token if it matches `expected`, otherwise
    /// produce an `UnexpectedToken`/`UnexpectedEof` diagnostic-ready error.
    fn expect(&mut self, expected: Token, context: &str) -> crate::error::ParseResult<SpannedToken> {
        if self.current.token == expected {
            Ok(self.advance())
        } else if self.at_eof() {
            Err(crate::error::ParseError::UnexpectedEof {
                expected: context.to_string(),
                span: self.current_span(),
            })
        } else {
            Err(crate::error::ParseError::UnexpectedToken {
                found: self.current.token.describe(),
                expected: context.to_string(),
                span: self.current_span(),
            })
        }
    }

    /// Consume an identifier and return its name.
    fn expect_ident(&mut self, context: &str) -> crate::error::ParseResult<(String, Span)> {
        let span = self.current_span();
        match self.current.token.clone() {
            Token::Ident(name) => {
                self.advance();
                Ok((name, span))
            }
            _ if self.at_eof() => Err(crate::error::ParseError::UnexpectedEof {
                expected: context.to_string(),
                span,
            }),
            _ => Err(crate::error::ParseError::UnexpectedToken {
                found: self.current.token.describe(),
                expected: context.to_string(),
                span,
            }),
        }
    }

    /// Error recovery: drop tokens until a statement boundary — the
    /// semicolon that likely ended the broken statement, or a keyword that
    /// starts a new one, whichever comes first. Always advances at least
    /// once so a malformed empty statement can't loop forever.
    fn synchronize(&mut self) {
        self.advance();
        while !self.at_eof() {
            if self.check(&Token::Semicolon) {
                self.advance();
                return;
            }
            if matches!(
                self.current.token,
                Token::KwFunc
                    | Token::KwLet
                    | Token::KwIf
                    | Token::KwWhile
                    | Token::KwReturn
                    | Token::KwPrint
                    | Token::KwExtern
                    | Token::Include
            ) {
                return;
            }
            self.advance();
        }
    }

    fn drain_to_eof(&mut self) {
        while !self.at_eof() {
            self.advance();
        }
    }
}
