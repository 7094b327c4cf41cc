//! Source location tracking.
//!
//! A [`Span`] carries both byte offsets (cheap to compare and slice with)
//! and 1-indexed line/column pairs (what diagnostics print). Line/column
//! values are filled in from a [`SourceMap`] built once per file, rather
//! than recomputed token by token.

use serde::{Deserialize, Serialize};

/// A half-open byte range plus its resolved line/column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// A span with no useful position, used for synthesized nodes.
    pub fn dummy() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Merge two spans into the smallest span covering both.
    pub fn merge(&self, other: &Span) -> Span {
        if self.start <= other.start {
            Span::new(self.start, other.end.max(self.end), self.line, self.column)
        } else {
            other.merge(self)
        }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Maps byte offsets to 1-indexed (line, column) pairs.
///
/// Built once per source file by scanning for newlines; every downstream
/// span is resolved against it rather than re-walking the source text.
#[derive(Debug, Clone)]
pub struct SourceMap {
    line_starts: Vec<usize>,
}

impl SourceMap {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, c) in source.char_indices() {
            if c == '\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    /// Resolve a byte offset to a 1-indexed (line, column) pair.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        };
        let line_start = self.line_starts.get(line).copied().unwrap_or(0);
        (line + 1, offset - line_start + 1)
    }

    /// Build a fully-resolved span from a byte range.
    pub fn span(&self, start: usize, end: usize) -> Span {
        let (line, column) = self.line_col(start);
        Span::new(start, end, line, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_tracks_newlines() {
        let map = SourceMap::new("let x: int = 1;\nprint(x);\n");
        assert_eq!(map.line_col(0), (1, 1));
        assert_eq!(map.line_col(16), (2, 1));
        assert_eq!(map.line_col(17), (2, 2));
    }

    #[test]
    fn merge_covers_both_spans() {
        let a = Span::new(0, 5, 1, 1);
        let b = Span::new(10, 15, 1, 11);
        let merged = a.merge(&b);
        assert_eq!(merged, Span::new(0, 15, 1, 1));
    }
}
