//! Core value model and action error taxonomy for ARO.
//!
//! This crate provides:
//! - [`Value`] - The tagged union used for all runtime data
//! - [`ValueStream`] - Buffered streams produced by services
//! - [`ActionError`] - The errors actions raise, with statement context

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod stream;
pub mod value;

pub use error::{ActionError, ActionErrorKind, ActionResult, ErrorContext};
pub use stream::ValueStream;
pub use value::{Value, ValueList, ValueMap};
