//! Integration tests for ActionError
//!
//! Tests error codes, messages and statement context.

use aro_foundation::{ActionError, ActionErrorKind, ErrorContext};

#[test]
fn codes_are_stable() {
    let cases = [
        (ActionError::missing_service("Console"), "missing-service"),
        (ActionError::undefined_repository("users"), "undefined-repository"),
        (ActionError::type_mismatch("list", "integer"), "type-mismatch"),
        (ActionError::validation_failed("bad"), "validation-failed"),
        (ActionError::comparison_failed("no"), "comparison-failed"),
        (ActionError::feature_set_not_found("x"), "feature-set-not-found"),
        (ActionError::thrown("NotFound", "gone"), "user-thrown"),
        (ActionError::timeout("fetch"), "timeout"),
    ];
    for (err, code) in cases {
        assert_eq!(err.code(), code, "{err}");
    }
}

#[test]
fn messages_without_context() {
    assert_eq!(
        ActionError::type_mismatch("list", "integer").to_string(),
        "type mismatch: expected list, got integer"
    );
    assert_eq!(
        ActionError::thrown("NotFound", "no such user").to_string(),
        "NotFound: no such user"
    );
}

#[test]
fn context_prefixes_the_statement() {
    let err = ActionError::undefined_repository("order-repository").with_context(
        ErrorContext::new("Cannot store the order into the order-repository")
            .in_feature_set("placeOrder")
            .at_line(4),
    );
    assert_eq!(
        err.to_string(),
        "Cannot store the order into the order-repository: undefined repository: order-repository"
    );
    assert_eq!(
        err.context.as_ref().and_then(|c| c.line),
        Some(4)
    );
    assert_eq!(
        err.kind,
        ActionErrorKind::UndefinedRepository("order-repository".to_string())
    );
}

#[test]
fn context_display_includes_location() {
    let ctx = ErrorContext::new("Cannot log the x to the console")
        .in_feature_set("main")
        .at_line(2);
    assert_eq!(
        ctx.to_string(),
        "Cannot log the x to the console in 'main' at line 2"
    );
}
