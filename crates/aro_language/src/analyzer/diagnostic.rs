//! Diagnostics produced by semantic analysis.

use std::fmt;

use thiserror::Error;

use crate::span::Span;

/// How serious a diagnostic is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Prevents execution.
    Error,
    /// Reported but does not block execution.
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warning => "warning",
        })
    }
}

/// The specific problem a diagnostic reports.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A name is bound twice in the same context.
    #[error("cannot rebind '{name}': variables are immutable")]
    ImmutabilityViolation {
        /// The rebound name.
        name: String,
    },

    /// A name is used before it is bound, published or provided.
    #[error("undefined variable '{name}'")]
    UndefinedVariable {
        /// The unresolved name.
        name: String,
    },

    /// A statement uses a preposition its action does not accept.
    #[error("action '{action}' does not accept preposition '{received}' (expected one of: {})", .expected.join(", "))]
    InvalidPreposition {
        /// Canonical verb of the action.
        action: String,
        /// The preposition used.
        received: String,
        /// The prepositions the action accepts.
        expected: Vec<String>,
    },

    /// No `Application-Start` feature set.
    #[error("no Application-Start feature set")]
    MissingEntryPoint,

    /// More than one `Application-Start` feature set.
    #[error("more than one Application-Start feature set")]
    DuplicateEntryPoint,

    /// More than one exit point of the same kind.
    #[error("more than one Application-End: {activity} feature set")]
    DuplicateExitPoint {
        /// `Success` or `Error`.
        activity: String,
    },

    /// Two feature sets share both name and business activity.
    #[error("duplicate feature set '{name}: {activity}'")]
    DuplicateFeatureSet {
        /// The repeated name.
        name: String,
        /// The repeated business activity.
        activity: String,
    },

    /// The verb is not registered; it may be supplied at run time.
    #[error("unknown action '{verb}'")]
    UnknownAction {
        /// The verb as written.
        verb: String,
    },
}

/// A single analysis finding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// Error or warning.
    pub severity: Severity,
    /// What went wrong.
    pub kind: DiagnosticKind,
    /// Human-readable message.
    pub message: String,
    /// Where it went wrong.
    pub span: Span,
    /// The feature set being analyzed, if any.
    pub feature_set: Option<String>,
}

impl Diagnostic {
    /// Creates an error diagnostic.
    #[must_use]
    pub fn error(kind: DiagnosticKind, span: Span) -> Self {
        Self::new(Severity::Error, kind, span)
    }

    /// Creates a warning diagnostic.
    #[must_use]
    pub fn warning(kind: DiagnosticKind, span: Span) -> Self {
        Self::new(Severity::Warning, kind, span)
    }

    fn new(severity: Severity, kind: DiagnosticKind, span: Span) -> Self {
        Self {
            severity,
            message: kind.to_string(),
            kind,
            span,
            feature_set: None,
        }
    }

    /// Attaches the feature set name.
    #[must_use]
    pub fn in_feature_set(mut self, name: impl Into<String>) -> Self {
        self.feature_set = Some(name.into());
        self
    }

    /// Returns true for error severity.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.severity)?;
        if self.span != Span::none() {
            write!(f, " at {}", self.span)?;
        }
        if let Some(fs) = &self.feature_set {
            write!(f, " in '{fs}'")?;
        }
        write!(f, ": {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_location_and_feature_set() {
        let diagnostic = Diagnostic::error(
            DiagnosticKind::InvalidPreposition {
                action: "extract".into(),
                received: "into".into(),
                expected: vec!["from".into(), "via".into()],
            },
            Span::new(10, 14, 3, 5),
        )
        .in_feature_set("Get User");
        assert_eq!(
            diagnostic.to_string(),
            "error at 3:5 in 'Get User': action 'extract' does not accept preposition 'into' (expected one of: from, via)"
        );
    }

    #[test]
    fn program_level_diagnostics_omit_location() {
        let diagnostic = Diagnostic::error(DiagnosticKind::MissingEntryPoint, Span::none());
        assert_eq!(diagnostic.to_string(), "error: no Application-Start feature set");
        assert!(diagnostic.is_error());
    }
}
