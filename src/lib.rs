//! ARO - Action-Result-Object business language
//!
//! This crate re-exports all layers of the ARO system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 4: aro_runtime    — Config, source loading, application lifecycle, CLI
//!          aro_stdlib     — Built-in actions
//! Layer 3: aro_engine     — Execution context, interpreter, event bus
//! Layer 2: aro_language   — Lexer, parser, semantic analyzer
//! Layer 1: aro_foundation — Core types (Value, ActionError)
//! ```

pub use aro_engine as engine;
pub use aro_foundation as foundation;
pub use aro_language as language;
pub use aro_runtime as runtime;
pub use aro_stdlib as stdlib;
