//! Lexical and syntactic errors.

use std::fmt;

use thiserror::Error;

use crate::span::Span;

/// A lexing failure. Lexing stops at the first one.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LexError {
    /// A string literal ran to end of input.
    #[error("unterminated string literal at {0}")]
    UnterminatedString(Span),

    /// A `${` interpolation was never closed.
    #[error("unterminated interpolation at {0}")]
    UnterminatedInterpolation(Span),

    /// A `(*` block comment was never closed.
    #[error("unterminated block comment at {0}")]
    UnterminatedComment(Span),

    /// An unknown escape sequence inside a string.
    #[error("invalid escape sequence '\\{sequence}' at {span}")]
    InvalidEscape {
        /// The text after the backslash.
        sequence: String,
        /// Location of the escape.
        span: Span,
    },

    /// A numeric literal that does not fit its type.
    #[error("invalid number '{text}' at {span}")]
    InvalidNumber {
        /// The literal text.
        text: String,
        /// Location of the literal.
        span: Span,
    },

    /// A character that cannot start any token.
    #[error("unexpected character '{character}' at {span}")]
    UnexpectedCharacter {
        /// The offending character.
        character: char,
        /// Location of the character.
        span: Span,
    },
}

impl LexError {
    /// Returns where the error occurred.
    #[must_use]
    pub const fn span(&self) -> Span {
        match self {
            Self::UnterminatedString(span)
            | Self::UnterminatedInterpolation(span)
            | Self::UnterminatedComment(span) => *span,
            Self::InvalidEscape { span, .. }
            | Self::InvalidNumber { span, .. }
            | Self::UnexpectedCharacter { span, .. } => *span,
        }
    }
}

/// A parse failure at one token.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message} at {span}")]
pub struct ParseError {
    /// Human-readable description.
    pub message: String,
    /// Description of the offending token.
    pub found: String,
    /// Location of the offending token.
    pub span: Span,
    /// Descriptions of the tokens that would have been accepted, sorted.
    pub expected: Vec<String>,
}

impl ParseError {
    /// Creates a parse error with a custom message and no expected set.
    #[must_use]
    pub fn new(message: impl Into<String>, found: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            found: found.into(),
            span,
            expected: Vec::new(),
        }
    }

    /// Creates an "expected X, found Y" error.
    #[must_use]
    pub fn unexpected(found: impl Into<String>, span: Span, expected: &[&str]) -> Self {
        let found = found.into();
        let mut expected: Vec<String> = expected.iter().map(ToString::to_string).collect();
        expected.sort();
        expected.dedup();
        let message = match expected.as_slice() {
            [] => format!("unexpected {found}"),
            [only] => format!("expected {only}, found {found}"),
            many => format!("expected one of {}, found {found}", many.join(", ")),
        };
        Self {
            message,
            found,
            span,
            expected,
        }
    }
}

/// Every syntactic problem found in one source file.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SyntaxErrors {
    /// Lexing failed; nothing was parsed.
    #[error("{0}")]
    Lex(LexError),
    /// Parsing failed at one or more places.
    #[error("{}", ParseErrorList(.0))]
    Parse(Vec<ParseError>),
}

impl SyntaxErrors {
    /// Returns the number of reported problems.
    #[must_use]
    pub fn count(&self) -> usize {
        match self {
            Self::Lex(_) => 1,
            Self::Parse(errors) => errors.len(),
        }
    }

    /// Returns each problem as a `(span, message)` pair.
    #[must_use]
    pub fn messages(&self) -> Vec<(Span, String)> {
        match self {
            Self::Lex(err) => vec![(err.span(), err.to_string())],
            Self::Parse(errors) => errors
                .iter()
                .map(|e| (e.span, e.message.clone()))
                .collect(),
        }
    }
}

impl From<LexError> for SyntaxErrors {
    fn from(err: LexError) -> Self {
        Self::Lex(err)
    }
}

struct ParseErrorList<'a>(&'a [ParseError]);

impl fmt::Display for ParseErrorList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}
