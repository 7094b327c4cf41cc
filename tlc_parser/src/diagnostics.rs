//! The diagnostic sink shared by every compiler phase.
//!
//! One [`Diagnostics`] is created per compilation and threaded through the
//! lexer, parser, semantic analyzer, and code generators. Each phase
//! appends to it and the driver checks [`Diagnostics::has_errors`] at phase
//! boundaries to decide whether to continue — see `SPEC_FULL.md` §5.

use std::collections::HashMap;

use crate::error::{LexError, ParseError};
use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Lexer,
    Parser,
    Semantic,
    Codegen,
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DiagnosticKind::Lexer => "lexer",
            DiagnosticKind::Parser => "parser",
            DiagnosticKind::Semantic => "semantic",
            DiagnosticKind::Codegen => "codegen",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    pub suggestion: Option<String>,
    pub span: Span,
    /// File this diagnostic belongs to, for grouped printing across a
    /// multi-file compilation (main file plus resolved includes).
    pub file: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sev = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(
            f,
            "{}:{}: {} [{}]: {}",
            self.file, self.span, sev, self.kind, self.message
        )?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n  help: {suggestion}")?;
        }
        Ok(())
    }
}

/// Collects diagnostics for one compilation.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
    had_error: bool,
    /// Mirrors the CLI's `--no-warnings` flag; suppressed warnings are
    /// still recorded (for `--dump-ast-json`/tests) but skipped on print.
    emit_warnings: bool,
}

impl Diagnostics {
    pub fn new(emit_warnings: bool) -> Self {
        Self {
            items: Vec::new(),
            had_error: false,
            emit_warnings,
        }
    }

    pub fn add(
        &mut self,
        kind: DiagnosticKind,
        severity: Severity,
        message: impl Into<String>,
        suggestion: Option<String>,
        span: Span,
        file: impl Into<String>,
    ) {
        if severity == Severity::Error {
            self.had_error = true;
        }
        self.items.push(Diagnostic {
            kind,
            severity,
            message: message.into(),
            suggestion,
            span,
            file: file.into(),
        });
    }

    pub fn add_lex_error(&mut self, err: &LexError, file: impl Into<String>) {
        self.add(
            DiagnosticKind::Lexer,
            Severity::Error,
            err.to_string(),
            err.suggestion(),
            err.span(),
            file,
        );
    }

    pub fn add_parse_error(&mut self, err: &ParseError, file: impl Into<String>) {
        self.add(
            DiagnosticKind::Parser,
            Severity::Error,
            err.to_string(),
            err.suggestion(),
            err.span(),
            file,
        );
    }

    pub fn has_errors(&self) -> bool {
        self.had_error
    }

    pub fn items(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    /// Grouped, position-ordered rendering of every recorded diagnostic,
    /// honoring `--no-warnings`.
    pub fn render_all(&self) -> String {
        let mut by_file: HashMap<&str, Vec<&Diagnostic>> = HashMap::new();
        for d in &self.items {
            if d.severity == Severity::Warning && !self.emit_warnings {
                continue;
            }
            by_file.entry(d.file.as_str()).or_default().push(d);
        }
        let mut files: Vec<&&str> = by_file.keys().collect();
        files.sort();

        let mut out = String::new();
        for file in files {
            let mut diags = by_file[file].clone();
            diags.sort_by_key(|d| (d.span.line, d.span.column));
            out.push_str(&format!("{file}:\n"));
            for d in diags {
                out.push_str(&format!("  {d}\n"));
            }
        }
        out
    }

    pub fn print_all(&self) {
        print!("{}", self.render_all());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_sets_had_error_warning_does_not() {
        let mut diags = Diagnostics::new(true);
        diags.add(
            DiagnosticKind::Semantic,
            Severity::Warning,
            "unused variable 'x'",
            None,
            Span::dummy(),
            "main.tl",
        );
        assert!(!diags.has_errors());
        diags.add(
            DiagnosticKind::Semantic,
            Severity::Error,
            "undefined variable 'y'",
            Some("did you mean 'x'?".to_string()),
            Span::dummy(),
            "main.tl",
        );
        assert!(diags.has_errors());
    }

    #[test]
    fn no_warnings_flag_suppresses_warnings_in_render() {
        let mut diags = Diagnostics::new(false);
        diags.add(
            DiagnosticKind::Semantic,
            Severity::Warning,
            "unused variable 'x'",
            None,
            Span::dummy(),
            "main.tl",
        );
        assert!(diags.render_all().is_empty());
    }
}
