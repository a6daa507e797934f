//! Whole-program scenarios
//!
//! Small but realistic programs run through the engine with the built-in
//! actions, checked first the way the runtime checks them.

use std::sync::Arc;
use std::time::Duration;

use aro_engine::services::{CapturedConsole, Console, MessageTransport, RecordingTransport};
use aro_engine::{Engine, ServiceRegistry};
use aro_foundation::Value;
use aro_language::Program;
use aro_language::ast::ExitKind;
use aro_runtime::{Application, RuntimeConfig, SourceFile, check_sources};

fn checked_program(source: &str) -> Program {
    let files = [SourceFile::new("main.aro", source)];
    let report = check_sources(
        &files,
        &aro_stdlib::builtins(),
        &aro_language::AnalyzerConfig::new(),
    );
    assert!(!report.has_errors(), "{report}");
    report.program
}

fn checked_engine(source: &str, services: ServiceRegistry) -> Engine {
    Engine::builder(checked_program(source))
        .with_actions(aro_stdlib::builtins())
        .with_services(services)
        .build()
}

const USER_SERVICE: &str = r#"
(Application-Start: User Service) {
    <Log> "ready" to the <console>.
}

(createUser: User API) {
    <Extract> the <data> from the <request: body>.
    <Validate> the <email: required email> from the <data: email>.
    <Create> the <user> with <data>.
    <Store> the <user> into the <user-repository>.
    <Emit> a <UserCreated: event> with <user>.
    <Return> a <Created: status> for the <request> with <user>.
}

(listUsers: User API) {
    <Retrieve> the <users> from the <user-repository>.
    <Return> an <OK: status> for the <request> with <users>.
}

(Send Welcome: UserCreated Handler) {
    <Extract> the <address> from the <event: email>.
    <Send> the <address> to the <mail-service>.
}
"#;

fn request(body: Value) -> Vec<(String, Value)> {
    vec![("request".to_string(), Value::map([("body", body)]))]
}

#[tokio::test]
async fn user_service_creates_stores_and_notifies() {
    let mail = Arc::new(RecordingTransport::new());
    let engine = checked_engine(
        USER_SERVICE,
        ServiceRegistry::new().with::<dyn MessageTransport>(mail.clone()),
    );
    engine.subscribe_handlers();

    let body = Value::map([
        ("id", Value::Int(1)),
        ("email", Value::from("ada@example.com")),
    ]);
    let created = engine.run_named("createUser", request(body.clone())).await.unwrap();
    assert_eq!(
        created.response,
        Some(Value::map([
            ("status", Value::from("Created")),
            ("data", body),
        ]))
    );

    assert!(engine.events().wait_idle(Duration::from_secs(5)).await);
    assert_eq!(
        mail.sent(),
        vec![("mail-service".to_string(), Value::from("ada@example.com"))]
    );

    let listed = engine.run_named("listUsers", Vec::new()).await.unwrap();
    let users = listed.response.and_then(|r| r.get("data").cloned());
    assert_eq!(users.as_ref().and_then(Value::len), Some(1));
}

#[tokio::test]
async fn user_service_rejects_bad_input() {
    let engine = checked_engine(USER_SERVICE, ServiceRegistry::new());
    let body = Value::map([("id", Value::Int(2)), ("email", Value::from("nobody"))]);
    let err = engine.run_named("createUser", request(body)).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Cannot validate the email from the data: validation failed: email is not a valid email address"
    );
    let stored = engine.repositories().repository("user-repository").unwrap().all();
    assert!(stored.is_empty());
}

#[tokio::test]
async fn set_operations_on_literal_lists() {
    let console = Arc::new(CapturedConsole::new());
    let engine = checked_engine(
        r#"
        (Application-Start: Sets) {
            <Compute> the <common: intersect> from [2, 3, 5] with [1, 2, 3, 4].
            <Compute> the <only-left: difference> from [2, 3, 5] with [1, 2, 3, 4].
            <Compute> the <either: union> from [2, 3] with [3, 4].
            <Log> the <common> to the <console>.
            <Log> the <only-left> to the <console>.
            <Log> the <either> to the <console>.
        }
        "#,
        ServiceRegistry::new().with::<dyn Console>(console.clone()),
    );
    let outcome = engine.run_named("Application-Start", Vec::new()).await.unwrap();
    assert_eq!(outcome.bindings.get("common"), Some(&Value::list([2, 3])));
    assert_eq!(console.lines(), vec!["[2,3]", "[5]", "[2,3,4]"]);
}

#[tokio::test]
async fn order_totals_with_loops_and_aggregates() {
    let console = Arc::new(CapturedConsole::new());
    let engine = checked_engine(
        r#"
        (Application-Start: Orders) {
            <Create> the <orders> with [
                { id: 1, total: 40, region: "north" },
                { id: 2, total: 15, region: "south" },
                { id: 3, total: 60, region: "north" }
            ].
            for each <order> in <orders> where <order>.total > 20 {
                <Log> "large order ${<order>.id}" to the <console>.
            }
            <Filter> the <north> from the <orders> where region = "north".
            <Compute> the <count: length> from the <north>.
            <Return> the <count> for the <startup>.
        }
        "#,
        ServiceRegistry::new().with::<dyn Console>(console.clone()),
    );
    let outcome = engine.run_named("Application-Start", Vec::new()).await.unwrap();
    assert_eq!(outcome.response, Some(Value::Int(2)));
    assert_eq!(console.lines(), vec!["large order 1", "large order 3"]);
}

// =============================================================================
// Names the runtime binds
// =============================================================================

const PRICING: &str = r#"
(Application-Start: Shop) {
    <Invoke> the <total> via the <price-order> with { qty: 3, unit: 4 }.
    <Emit> an <OrderPriced: event> with <total>.
    <Throw> a <Declined: error> for the <total> when <total> > 10.
}

(Price Order: Shop) {
    <Extract> the <qty> from the <input: qty>.
    <Extract> the <unit> from the <input: unit>.
    <Compute> the <total> from <qty> * <unit>.
    <Return> the <total> for the <caller>.
}

(Record Total: OrderPriced Handler) {
    <Compute> the <doubled> from <event> * 2.
    <Log> the <doubled> to the <console>.
}

(Application-End: Error) {
    <Log> the <error> to the <console>.
}
"#;

#[tokio::test]
async fn checked_handlers_and_invocations_never_break_invariants() {
    let console = Arc::new(CapturedConsole::new());
    let engine = checked_engine(
        PRICING,
        ServiceRegistry::new().with::<dyn Console>(console.clone()),
    );
    engine.subscribe_handlers();

    let priced = engine
        .invoke("Price Order", Value::map([("qty", Value::Int(2)), ("unit", Value::Int(5))]))
        .await;
    assert_eq!(priced.unwrap(), Value::Int(10));

    let results = engine.publish_event("OrderPriced", Value::Int(7)).wait().await;
    assert_eq!(results.len(), 1);
    assert!(results.iter().all(Result::is_ok), "{results:?}");
    assert_eq!(console.lines(), vec!["14"]);

    let err = engine.run_named("Application-Start", Vec::new()).await.unwrap_err();
    assert!(!err.is_invariant(), "{err}");
    assert!(err.as_action().is_some());
}

#[tokio::test]
async fn checked_error_exit_sees_the_failure() {
    let console = Arc::new(CapturedConsole::new());
    let app = Application::from_program(
        checked_program(PRICING),
        ServiceRegistry::new().with::<dyn Console>(console.clone()),
        RuntimeConfig::new()
            .with_handle_signals(false)
            .with_shutdown_grace(Duration::from_secs(2)),
    );
    let outcome = app.run().await.unwrap();
    assert_eq!(outcome.exit, ExitKind::Error);
    assert!(outcome.drained);
    let failure = outcome.failure.unwrap();
    assert!(!failure.is_invariant(), "{failure}");

    let lines = console.lines();
    assert_eq!(lines.len(), 2, "{lines:?}");
    assert_eq!(lines[0], "24");
    assert!(lines[1].contains("Declined"), "{lines:?}");
}
