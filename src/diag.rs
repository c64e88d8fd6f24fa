//! Source positions, spans, and the spanned error wrapper shared by all
//! diagnostic kinds.

use std::fmt::{Display, Formatter, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A half-open source range. The all-zero span marks synthesized code that has
/// no source counterpart (real source positions are 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub const SYNTHESIZED: Span = Span {
        start: Position {
            offset: 0,
            line: 0,
            column: 0,
        },
        end: Position {
            offset: 0,
            line: 0,
            column: 0,
        },
    };

    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// A zero-length span at the given line/column. Convenient for tests and
    /// for IR produced without offset tracking.
    pub fn point(line: usize, column: usize) -> Self {
        let pos = Position {
            offset: 0,
            line,
            column,
        };
        Self {
            start: pos,
            end: pos,
        }
    }

    pub fn is_synthesized(&self) -> bool {
        self.start.line == 0
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// An error kind paired with the span it was reported at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpannedError<K> {
    pub kind: K,
    pub span: Span,
}

impl<K> SpannedError<K> {
    pub fn new(kind: K, span: Span) -> Self {
        Self { kind, span }
    }
}

impl<K: Display> Display for SpannedError<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "({}) {}", self.span.start, self.kind)
    }
}

impl<K: Display + std::fmt::Debug> std::error::Error for SpannedError<K> {}
