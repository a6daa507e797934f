//! Error types raised by actions at runtime.
//!
//! Uses `thiserror` for the kind taxonomy; [`ActionError`] pairs a kind with
//! optional context describing the statement that failed.

use std::fmt;

use thiserror::Error;

/// Result type for action execution.
pub type ActionResult<T> = std::result::Result<T, ActionError>;

/// An error raised while executing a statement.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub struct ActionError {
    /// The kind of error that occurred.
    pub kind: ActionErrorKind,
    /// Optional context about the statement that failed.
    pub context: Option<ErrorContext>,
}

impl ActionError {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ActionErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error, keeping any context already attached.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        if self.context.is_none() {
            self.context = Some(context);
        }
        self
    }

    /// Returns the natural-language phrase of the failing statement, if known.
    #[must_use]
    pub fn statement(&self) -> Option<&str> {
        self.context.as_ref().map(|c| c.statement.as_str())
    }

    /// Returns the stable, kebab-case code for this error's kind.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Creates an undefined variable error.
    #[must_use]
    pub fn undefined_variable(name: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::UndefinedVariable(name.into()))
    }

    /// Creates a property not found error.
    #[must_use]
    pub fn property_not_found(property: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::PropertyNotFound {
            property: property.into(),
            target: target.into(),
        })
    }

    /// Creates an invalid preposition error.
    #[must_use]
    pub fn invalid_preposition(
        action: impl Into<String>,
        received: impl Into<String>,
        expected: Vec<String>,
    ) -> Self {
        Self::new(ActionErrorKind::InvalidPreposition {
            action: action.into(),
            received: received.into(),
            expected,
        })
    }

    /// Creates a missing service error.
    #[must_use]
    pub fn missing_service(service: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::MissingService(service.into()))
    }

    /// Creates an undefined repository error.
    #[must_use]
    pub fn undefined_repository(name: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::UndefinedRepository(name.into()))
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        })
    }

    /// Creates a user-thrown error.
    #[must_use]
    pub fn thrown(error_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::Thrown {
            error_type: error_type.into(),
            reason: reason.into(),
        })
    }

    /// Creates an unknown action error.
    #[must_use]
    pub fn unknown_action(verb: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::UnknownAction(verb.into()))
    }

    /// Creates a validation failure.
    #[must_use]
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::ValidationFailed(message.into()))
    }

    /// Creates a comparison failure.
    #[must_use]
    pub fn comparison_failed(message: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::ComparisonFailed(message.into()))
    }

    /// Creates an I/O error.
    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::Io(message.into()))
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::Network(message.into()))
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::Timeout(operation.into()))
    }

    /// Creates a feature set not found error.
    #[must_use]
    pub fn feature_set_not_found(name: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::FeatureSetNotFound(name.into()))
    }

    /// Creates a generic runtime error.
    #[must_use]
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ActionErrorKind::Runtime(message.into()))
    }
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(ctx) => write!(f, "{}: {}", ctx.statement, self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Categorized action error kinds for pattern matching.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ActionErrorKind {
    /// A variable was referenced before being bound.
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),

    /// A key path step did not exist on the value it navigated.
    #[error("property '{property}' not found on {target}")]
    PropertyNotFound {
        /// The property that was requested.
        property: String,
        /// Description of the value that was navigated.
        target: String,
    },

    /// The statement's preposition is not accepted by the action.
    #[error("action '{action}' does not accept preposition '{received}' (expected one of: {})", .expected.join(", "))]
    InvalidPreposition {
        /// The action verb.
        action: String,
        /// The preposition the statement used.
        received: String,
        /// The prepositions the action accepts.
        expected: Vec<String>,
    },

    /// No service of the requested capability was registered.
    #[error("missing service: {0}")]
    MissingService(String),

    /// A repository name could not be resolved.
    #[error("undefined repository: {0}")]
    UndefinedRepository(String),

    /// A value had the wrong type for the operation.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The expected type.
        expected: String,
        /// The actual type encountered.
        actual: String,
    },

    /// An error raised explicitly by a `Throw` statement.
    #[error("{error_type}: {reason}")]
    Thrown {
        /// The user-declared error type.
        error_type: String,
        /// The reason given by the statement.
        reason: String,
    },

    /// No action is registered for the verb.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// A validation rule rejected a value.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// A comparison or assertion did not hold.
    #[error("comparison failed: {0}")]
    ComparisonFailed(String),

    /// A file or stream operation failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// A network operation failed.
    #[error("network error: {0}")]
    Network(String),

    /// An operation did not complete in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// A feature set was invoked by a name no loaded program defines.
    #[error("feature set not found: {0}")]
    FeatureSetNotFound(String),

    /// Any other runtime failure.
    #[error("{0}")]
    Runtime(String),
}

impl ActionErrorKind {
    /// Returns the stable, kebab-case code for this kind.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UndefinedVariable(_) => "undefined-variable",
            Self::PropertyNotFound { .. } => "property-not-found",
            Self::InvalidPreposition { .. } => "invalid-preposition",
            Self::MissingService(_) => "missing-service",
            Self::UndefinedRepository(_) => "undefined-repository",
            Self::TypeMismatch { .. } => "type-mismatch",
            Self::Thrown { .. } => "user-thrown",
            Self::UnknownAction(_) => "unknown-action",
            Self::ValidationFailed(_) => "validation-failed",
            Self::ComparisonFailed(_) => "comparison-failed",
            Self::Io(_) => "io-error",
            Self::Network(_) => "network-error",
            Self::Timeout(_) => "timeout",
            Self::FeatureSetNotFound(_) => "feature-set-not-found",
            Self::Runtime(_) => "runtime-error",
        }
    }
}

/// Where an action error occurred.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorContext {
    /// The failing statement rendered as an English sentence,
    /// e.g. "Cannot retrieve the user from the user-repository where id = 123".
    pub statement: String,
    /// Name of the feature set that was running.
    pub feature_set: Option<String>,
    /// Source line of the statement (1-indexed).
    pub line: Option<u32>,
}

impl ErrorContext {
    /// Creates a context for the given statement phrase.
    #[must_use]
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            feature_set: None,
            line: None,
        }
    }

    /// Sets the feature set name.
    #[must_use]
    pub fn in_feature_set(mut self, name: impl Into<String>) -> Self {
        self.feature_set = Some(name.into());
        self
    }

    /// Sets the source line.
    #[must_use]
    pub const fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.statement)?;
        if let Some(feature_set) = &self.feature_set {
            write!(f, " in '{feature_set}'")?;
        }
        if let Some(line) = self.line {
            write!(f, " at line {line}")?;
        }
        Ok(())
    }
}
