//! Errors that end a feature-set run.

use aro_foundation::ActionError;
use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, ExecutionError>;

/// Why a feature-set run stopped early.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// A statement's action failed. Recoverable at the task boundary.
    #[error(transparent)]
    Action(#[from] ActionError),

    /// The engine found its own state inconsistent, for example a rebind
    /// that analysis should have rejected.
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl ExecutionError {
    /// Returns the action error, if this is one.
    #[must_use]
    pub const fn as_action(&self) -> Option<&ActionError> {
        match self {
            Self::Action(e) => Some(e),
            Self::Invariant(_) => None,
        }
    }

    /// Returns true for internal invariant failures.
    #[must_use]
    pub const fn is_invariant(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }
}

/// A rebind of an immutable name.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("cannot rebind '{name}': variables are immutable")]
pub struct RebindError {
    /// The name that was already bound.
    pub name: String,
}

impl From<RebindError> for ExecutionError {
    fn from(e: RebindError) -> Self {
        Self::Invariant(e.to_string())
    }
}
