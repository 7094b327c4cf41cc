//! tlc_parser
//!
//! Lexer, AST and recursive-descent parser for the TL language: a small,
//! statically-typed, C-like language compiled ahead of time by the `tlc`
//! crate.
//!
//! # Example
//!
//! ```
//! use tlc_parser::parse;
//!
//! let source = "func main() -> int { return 0; }";
//! let (program, diagnostics) = parse(source, "main.tl");
//! assert!(!diagnostics.has_errors());
//! assert_eq!(program.functions.len(), 1);
//! ```

pub mod ast;
pub mod diagnostics;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod span;
pub mod token;

pub use ast::Program;
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use error::{LexError, ParseError};
pub use lexer::{Lexer, SpannedToken};
pub use parser::Parser;
pub use span::{SourceMap, Span};
pub use token::Token;

/// Parse a single TL file into a [`Program`], recovering from lexical and
/// syntactic errors in place rather than stopping at the first one.
pub fn parse(source: &str, file: impl Into<String>) -> (Program, Diagnostics) {
    Parser::new(source, file, true).parse()
}

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_function() {
        let (program, diagnostics) = parse("func main() -> int { return 0; }", "main.tl");
        assert!(!diagnostics.has_errors());
        assert_eq!(program.functions.len(), 1);
        assert_eq!(program.functions[0].name, "main");
    }

    #[test]
    fn recovers_from_a_malformed_statement() {
        let src = "func main() -> int { let x: int = ; return 0; }";
        let (program, diagnostics) = parse(src, "main.tl");
        assert!(diagnostics.has_errors());
        assert_eq!(program.functions.len(), 1);
    }

    #[test]
    fn version_is_non_empty() {
        assert!(!version().is_empty());
    }
}
