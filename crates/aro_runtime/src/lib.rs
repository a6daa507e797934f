//! Runtime for ARO applications.
//!
//! This crate provides:
//! - [`RuntimeConfig`] - Settings, built in code or read from `aro.toml`
//! - [`source`] - Discovery of `.aro` files under a directory
//! - [`check`] - Whole-program static checking across files
//! - [`Application`] - Start, keep-alive, drain and exit lifecycle
//! - [`testing`] - Runner for `* Test` feature sets
//! - [`logging`] - `tracing` subscriber installation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod application;
pub mod check;
pub mod config;
pub mod console;
pub mod logging;
pub mod source;
pub mod testing;

pub use application::{
    Application, ApplicationError, ApplicationOutcome, ShutdownHandle, default_services,
};
pub use check::{CheckReport, Problem, check_sources};
pub use config::{CONFIG_FILE, ConfigError, RuntimeConfig};
pub use console::StdoutConsole;
pub use source::{SourceError, SourceFile};
pub use testing::{TestReport, TestResult, run_tests};
