//! Lexer wrapping the generated token matcher with hand-written scanning
//! for strings and block comments.

use logos::Logos;

use crate::error::LexError;
use crate::span::{SourceMap, Span};
use crate::token::Token;

/// A token together with its resolved span and the exact source slice it
/// came from (useful for diagnostics and for the `--tokens` dump).
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

impl SpannedToken {
    pub fn new(token: Token, span: Span) -> Self {
        Self { token, span }
    }
}

/// TL lexer.
///
/// Simple tokens (keywords, operators, identifiers, numbers) come straight
/// out of the `logos`-generated matcher. Strings and block comments are
/// opened by the matcher (`"`, `/*`) and then scanned by hand, after which
/// the matcher is restarted past the consumed bytes — the same split the
/// parser crate this is grounded on uses for its own irregular tokens.
pub struct Lexer<'a> {
    source: &'a str,
    inner: logos::Lexer<'a, Token>,
    source_map: SourceMap,
    peeked: Option<(Result<SpannedToken, LexError>,)>,
    at_eof: bool,
    /// Byte offset the current `inner` lexer was restarted from, so spans
    /// it reports (always relative to its own slice) can be translated
    /// back into absolute offsets into `source`.
    offset_shift: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            inner: Token::lexer(source),
            source_map: SourceMap::new(source),
            peeked: None,
            at_eof: false,
            offset_shift: 0,
        }
    }

    pub fn source_map(&self) -> &SourceMap {
        &self.source_map
    }

    fn make_span(&self, start: usize, end: usize) -> Span {
        self.source_map.span(start, end)
    }

    fn restart_from(&mut self, offset: usize) {
        self.inner = Token::lexer(&self.source[offset..]);
        // `logos::Lexer` reports spans relative to the slice it was built
        // from, so every span read after a restart must be shifted by the
        // original byte offset the slice started at.
        self.offset_shift = offset;
    }

    /// Get the next token, consuming the peeked one if present.
    pub fn next_token(&mut self) -> Result<SpannedToken, LexError> {
        if let Some((result,)) = self.peeked.take() {
            return result;
        }
        self.next_token_internal()
    }

    /// Look at the next token without consuming it. Calling this any
    /// number of times in a row must return the same result and must not
    /// perturb what a following `next_token()` returns.
    pub fn peek_token(&mut self) -> Result<SpannedToken, LexError> {
        if self.peeked.is_none() {
            self.peeked = Some((self.next_token_internal(),));
        }
        self.peeked.as_ref().unwrap().0.clone()
    }

    fn shifted_span(&self) -> (usize, usize) {
        let span = self.inner.span();
        (span.start + self.offset_shift, span.end + self.offset_shift)
    }

    fn next_token_internal(&mut self) -> Result<SpannedToken, LexError> {
        if self.at_eof {
            let end = self.source.len();
            return Ok(SpannedToken::new(Token::Eof, self.make_span(end, end)));
        }

        let raw = self.inner.next();
        let Some(result) = raw else {
            self.at_eof = true;
            let end = self.source.len();
            return Ok(SpannedToken::new(Token::Eof, self.make_span(end, end)));
        };

        let (start, end) = self.shifted_span();

        match result {
            Ok(Token::BlockCommentStart) => {
                let comment_end = self.scan_block_comment(end)?;
                self.restart_from(comment_end);
                self.next_token_internal()
            }
            Ok(Token::Quote) => {
                let (text, string_end) = self.scan_string(end)?;
                self.restart_from(string_end);
                let span = self.make_span(start, string_end);
                Ok(SpannedToken::new(Token::StringLit(text), span))
            }
            Ok(Token::Number(n)) if n.text.contains(['e', 'E']) && has_malformed_exponent(&n.text) => {
                // Unreachable in practice: `lex_number` already rejects
                // these, kept as a defensive double check since the
                // regex/callback split is easy to get subtly wrong.
                Err(LexError::MalformedExponent {
                    literal: n.text,
                    span: self.make_span(start, end),
                })
            }
            Ok(token) => Ok(SpannedToken::new(token, self.make_span(start, end))),
            Err(mut err) => {
                patch_error_span(&mut err, self.source, start, end, &self.source_map);
                Err(err)
            }
        }
    }

    /// Scan a `/* ... */` block comment body (non-nesting). `start` is the
    /// byte offset right after `/*`. Returns the offset right after the
    /// closing `*/`.
    fn scan_block_comment(&self, start: usize) -> Result<usize, LexError> {
        let bytes = self.source.as_bytes();
        let mut i = start;
        while i < bytes.len() {
            if bytes[i] == b'*' && i + 1 < bytes.len() && bytes[i + 1] == b'/' {
                return Ok(i + 2);
            }
            i += 1;
        }
        Err(LexError::UnterminatedBlockComment {
            span: self.make_span(start, bytes.len()),
        })
    }

    /// Scan a string body, decoding `\n \t \r \\ \"` escapes. `start` is the
    /// byte offset right after the opening `"`. Returns the decoded text
    /// and the offset right after the closing `"`.
    ///
    /// Non-escaped bytes are copied verbatim (not decoded char-by-char) so
    /// multi-byte UTF-8 sequences in the source survive intact — TL strings
    /// are UTF-8 bytes, and `as char` on an individual continuation byte
    /// would corrupt anything outside ASCII.
    fn scan_string(&self, start: usize) -> Result<(String, usize), LexError> {
        let bytes = self.source.as_bytes();
        let mut i = start;
        let mut decoded: Vec<u8> = Vec::new();
        while i < bytes.len() {
            match bytes[i] {
                b'"' => {
                    let text = String::from_utf8(decoded)
                        .expect("copied bytes are either escape-produced ASCII or verbatim slices of a valid UTF-8 source");
                    return Ok((text, i + 1));
                }
                b'\\' if i + 1 < bytes.len() => {
                    match bytes[i + 1] {
                        b'n' => decoded.push(b'\n'),
                        b't' => decoded.push(b'\t'),
                        b'r' => decoded.push(b'\r'),
                        b'\\' => decoded.push(b'\\'),
                        b'"' => decoded.push(b'"'),
                        other => decoded.push(other),
                    }
                    i += 2;
                }
                b'\n' => break,
                other => {
                    decoded.push(other);
                    i += 1;
                }
            }
        }
        Err(LexError::UnterminatedString {
            span: self.make_span(start, i),
        })
    }
}

fn has_malformed_exponent(text: &str) -> bool {
    let Some(pos) = text.find(['e', 'E']) else {
        return false;
    };
    let rest = &text[pos + 1..];
    let digits = rest.strip_prefix(['+', '-']).unwrap_or(rest);
    digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit())
}

fn patch_error_span(err: &mut LexError, source: &str, start: usize, end: usize, map: &SourceMap) {
    let span = map.span(start, end);
    match err {
        LexError::UnexpectedChar { found, span: s } => {
            *found = source[start..end].chars().next().unwrap_or('\0');
            *s = span;
        }
        LexError::MalformedExponent { span: s, .. }
        | LexError::UnterminatedString { span: s, .. }
        | LexError::UnterminatedBlockComment { span: s, .. } => {
            *s = span;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token().expect("no lex errors expected");
            if tok.token == Token::Eof {
                break;
            }
            out.push(tok.token);
        }
        out
    }

    #[test]
    fn skips_line_and_block_comments() {
        let toks = tokens("let x: int = 1; // trailing\n/* block\ncomment */ let y: int = 2;");
        assert_eq!(toks.iter().filter(|t| **t == Token::KwLet).count(), 2);
    }

    #[test]
    fn decodes_string_escapes() {
        let toks = tokens(r#""a\nb\t\"c\"""#);
        assert_eq!(toks, vec![Token::StringLit("a\nb\t\"c\"".to_string())]);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let mut lexer = Lexer::new("\"abc");
        let err = lexer.next_token().unwrap_err();
        assert!(matches!(err, LexError::UnterminatedString { .. }));
    }

    #[test]
    fn unterminated_block_comment_then_eof() {
        let mut lexer = Lexer::new("/* never closed");
        let err = lexer.next_token().unwrap_err();
        assert!(matches!(err, LexError::UnterminatedBlockComment { .. }));
        let next = lexer.next_token().unwrap();
        assert_eq!(next.token, Token::Eof);
    }

    #[test]
    fn peek_token_does_not_consume() {
        let mut lexer = Lexer::new("func main");
        let peeked = lexer.peek_token().unwrap();
        assert_eq!(peeked.token, Token::KwFunc);
        let again = lexer.peek_token().unwrap();
        assert_eq!(again.token, Token::KwFunc);
        let consumed = lexer.next_token().unwrap();
        assert_eq!(consumed.token, Token::KwFunc);
        let next = lexer.next_token().unwrap();
        assert_eq!(next.token, Token::Ident("main".to_string()));
    }

    #[test]
    fn line_and_column_track_across_lines() {
        let mut lexer = Lexer::new("a\nb");
        let first = lexer.next_token().unwrap();
        assert_eq!((first.span.line, first.span.column), (1, 1));
        let second = lexer.next_token().unwrap();
        assert_eq!((second.span.line, second.span.column), (2, 1));
    }

    #[test]
    fn eof_is_repeatable() {
        let mut lexer = Lexer::new("");
        assert_eq!(lexer.next_token().unwrap().token, Token::Eof);
        assert_eq!(lexer.next_token().unwrap().token, Token::Eof);
    }
}
