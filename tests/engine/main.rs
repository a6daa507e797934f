//! Integration tests for Layer 3: Engine
//!
//! Tests for control flow, events, repositories and error reporting, run
//! with the built-in actions.

mod control_flow;
mod errors;
mod events;
mod repositories;

use std::sync::Arc;

use aro_engine::services::{CapturedConsole, Console};
use aro_engine::{Engine, ServiceRegistry};
use aro_language::parse_program;

/// Builds an engine over `source` with the built-in actions and a captured
/// console.
pub fn engine(source: &str) -> (Engine, Arc<CapturedConsole>) {
    engine_with(source, ServiceRegistry::new())
}

/// Like [`engine`] with extra services.
pub fn engine_with(source: &str, services: ServiceRegistry) -> (Engine, Arc<CapturedConsole>) {
    let program = parse_program(source).unwrap_or_else(|e| panic!("{e}"));
    let console = Arc::new(CapturedConsole::new());
    let engine = Engine::builder(program)
        .with_actions(aro_stdlib::builtins())
        .with_services(services.with::<dyn Console>(console.clone()))
        .build();
    (engine, console)
}
