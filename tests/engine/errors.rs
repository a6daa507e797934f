//! Integration tests for how failures are reported.

use aro_foundation::{ActionError, ActionErrorKind};

use crate::engine;

fn action_error(err: &aro_engine::ExecutionError) -> &ActionError {
    err.as_action().unwrap_or_else(|| panic!("not an action error: {err}"))
}

#[tokio::test]
async fn errors_carry_the_statement_feature_set_and_line() {
    let (engine, _) = engine(
        "(Totals: Reports) {
    <Create> the <x> with 1.
    <Compute> the <sum> from the <ghost>.
}",
    );
    let err = engine.run_named("Totals", Vec::new()).await.unwrap_err();
    let action = action_error(&err);
    let context = action.context.as_ref().unwrap();
    assert_eq!(context.statement, "Cannot compute the sum from the ghost");
    assert_eq!(context.feature_set.as_deref(), Some("Totals"));
    assert_eq!(context.line, Some(3));
    assert_eq!(
        err.to_string(),
        "Cannot compute the sum from the ghost: undefined variable: ghost"
    );
}

#[tokio::test]
async fn failed_assertions_report_both_values() {
    let (engine, _) = engine(
        "(sums: Math Test) {
    <Compute> the <total> from 4 + 5.
    <Then> the <total> against 10.
}",
    );
    let err = engine.run_named("sums", Vec::new()).await.unwrap_err();
    assert_eq!(
        action_error(&err).kind,
        ActionErrorKind::ComparisonFailed("expected 10, got 9".to_string())
    );
}

#[tokio::test]
async fn thrown_errors_keep_type_and_reason() {
    let (engine, _) = engine(
        r#"(Checkout: Shop) {
    <Throw> a <PaymentDeclined: error> for the <order> with "card expired".
}"#,
    );
    let err = engine.run_named("Checkout", Vec::new()).await.unwrap_err();
    assert_eq!(
        action_error(&err).kind,
        ActionErrorKind::Thrown {
            error_type: "PaymentDeclined".to_string(),
            reason: "card expired".to_string(),
        }
    );
}

#[tokio::test]
async fn statements_after_a_failure_do_not_run() {
    let (engine, console) = engine(
        r#"(Steps: Demo) {
    <Log> "one" to the <console>.
    <Throw> a <Stop: error> for the <caller>.
    <Log> "two" to the <console>.
}"#,
    );
    assert!(engine.run_named("Steps", Vec::new()).await.is_err());
    assert_eq!(console.lines(), vec!["one"]);
}

#[tokio::test]
async fn failing_guards_skip_instead_of_failing() {
    let (engine, console) = engine(
        r#"(Guarded: Demo) {
    <Create> the <amount> with 3.
    <Throw> a <TooLarge: error> for the <amount> when <amount> > 10.
    <Log> "kept going" to the <console>.
}"#,
    );
    engine.run_named("Guarded", Vec::new()).await.unwrap();
    assert_eq!(console.lines(), vec!["kept going"]);
}

#[tokio::test]
async fn unknown_feature_sets_are_reported() {
    let (engine, _) = engine("(Only: Demo) { }");
    let err = engine.run_named("Missing", Vec::new()).await.unwrap_err();
    assert_eq!(action_error(&err).code(), "feature-set-not-found");
}

#[tokio::test]
async fn invoked_failures_keep_the_inner_statement() {
    let (engine, _) = engine(
        r#"(Outer: Demo) {
    <Invoke> the <result> via the <inner>.
}
(inner: Demo) {
    <Throw> a <Broken: error> for the <caller> with "nope".
}"#,
    );
    let err = engine.run_named("Outer", Vec::new()).await.unwrap_err();
    let action = action_error(&err);
    assert_eq!(action.code(), "user-thrown");
    assert_eq!(
        action.context.as_ref().and_then(|c| c.feature_set.as_deref()),
        Some("inner")
    );
}
