//! Built-in actions for ARO.
//!
//! Actions are grouped by role:
//! - [`request`]: pull data in (extract, retrieve, request, read, list)
//! - [`own`]: derive new values (compute, validate, compare, transform, ...)
//! - [`response`]: produce output (return, throw, log, send, write, emit, then)
//! - [`export`]: hand values to repositories (store, delete)
//! - [`server`]: control long-running services (start, keepalive, stop)
//!
//! [`register_builtins`] installs all of them into an
//! [`ActionRegistry`](aro_engine::ActionRegistry).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod compute;
pub mod export;
pub mod own;
pub mod request;
pub mod response;
pub mod server;

use aro_engine::eval::navigate;
use aro_engine::{ActionRegistry, ExecutionContext};
use aro_foundation::{ActionError, ActionResult, Value};
use aro_language::ast::ResultDescriptor;
use aro_language::contract::ActionContract;

/// Installs every built-in action.
pub fn register_builtins(registry: &mut ActionRegistry) {
    request::register(registry);
    own::register(registry);
    response::register(registry);
    export::register(registry);
    server::register(registry);
}

/// Returns a registry holding every built-in action.
#[must_use]
pub fn builtins() -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    register_builtins(&mut registry);
    registry
}

/// Every built-in contract, in registration order.
#[must_use]
pub fn contracts() -> Vec<ActionContract> {
    [
        request::CONTRACTS,
        own::CONTRACTS,
        response::CONTRACTS,
        export::CONTRACTS,
        server::CONTRACTS,
    ]
    .concat()
}

// =============================================================================
// Shared helpers
// =============================================================================

/// The value a statement's result names: the literal, or the bound value
/// navigated along the result's key path.
pub(crate) fn consumed(result: &ResultDescriptor, ctx: &ExecutionContext) -> ActionResult<Value> {
    let value = ctx.require(result.base())?;
    navigate(&value, result.base(), &result.noun.key_path())
}

/// Renders a value for line-oriented output: strings as-is, everything else
/// as compact JSON.
pub(crate) fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_string(),
        other => other.to_json().to_string(),
    }
}

/// Extracts text from a value that must be a string.
pub(crate) fn text(value: &Value) -> ActionResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| type_mismatch("string", value))
}

pub(crate) fn type_mismatch(expected: &str, actual: &Value) -> ActionError {
    ActionError::type_mismatch(expected, actual.type_name())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_verb_is_registered_once() {
        let registry = builtins();
        let verbs: usize = contracts().iter().map(|c| c.verbs.len()).sum();
        assert_eq!(registry.len(), verbs);
        for verb in ["extract", "compute", "return", "store", "keepalive", "wait"] {
            assert!(registry.get(verb).is_some(), "{verb} is missing");
        }
    }

    #[test]
    fn render_uses_json_for_structured_values() {
        assert_eq!(render(&Value::from("plain")), "plain");
        assert_eq!(render(&Value::map([("a", 1)])), r#"{"a":1}"#);
        assert_eq!(render(&Value::list(["x", "y"])), r#"["x","y"]"#);
    }
}
