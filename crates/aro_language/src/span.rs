//! Source positions.
//!
//! Every token, statement and expression carries the [`Span`] it was read
//! from, so diagnostics can point at `line:column`.

use std::fmt;

/// A byte range of ARO source plus the line and column it starts on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// First byte.
    pub start: usize,
    /// One past the last byte.
    pub end: usize,
    /// 1-based line of `start`; 0 for [`Span::none`].
    pub line: u32,
    /// 1-based column of `start`; 0 for [`Span::none`].
    pub column: u32,
}

impl Span {
    /// A span of `start..end` beginning at `line:column`.
    #[must_use]
    pub const fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// The empty span the lexer starts from.
    #[must_use]
    pub const fn at_start() -> Self {
        Self::new(0, 0, 1, 1)
    }

    /// Position of program-wide diagnostics and of trees built without
    /// source.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// The span from the start of `self` through the end of `last`, keeping
    /// the position of `self`.
    #[must_use]
    pub const fn through(self, last: Self) -> Self {
        Self {
            end: last.end,
            ..self
        }
    }

    /// True if `next` starts on the byte this span ends on, with no
    /// whitespace between. Distinguishes `<user>.name` from a
    /// statement-ending `.`.
    #[must_use]
    pub const fn adjoins(&self, next: &Self) -> bool {
        self.end == next.start
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
