//! Application lifecycle tests
//!
//! Loads programs from disk and runs them from `Application-Start` through
//! the matching `Application-End`.

use std::sync::Arc;
use std::time::Duration;

use aro_engine::ServiceRegistry;
use aro_engine::services::{CapturedConsole, Console};
use aro_foundation::Value;
use aro_language::ast::ExitKind;
use aro_runtime::{Application, ApplicationError, RuntimeConfig};

use crate::Scratch;

fn config(dir: &Scratch) -> RuntimeConfig {
    RuntimeConfig::new()
        .with_source_dir(dir.path())
        .with_handle_signals(false)
        .with_shutdown_grace(Duration::from_secs(2))
}

fn load(dir: &Scratch) -> (Application, Arc<CapturedConsole>) {
    let console = Arc::new(CapturedConsole::new());
    let services = ServiceRegistry::new().with::<dyn Console>(console.clone());
    let app = Application::load_with_services(config(dir), services)
        .unwrap_or_else(|e| panic!("{e}"));
    (app, console)
}

// =============================================================================
// Start and exit
// =============================================================================

#[tokio::test]
async fn program_split_across_files_runs_end_to_end() {
    let dir = Scratch::new();
    dir.write(
        "main.aro",
        r#"
        (Application-Start: Greeter) {
            <Create> the <greeting> with "Hello, ARO".
            <Log> the <greeting> to the <console>.
            <Invoke> the <total> via the <add-numbers> with { a: 2, b: 3 }.
            <Return> an <OK: status> for the <startup> with <total>.
        }
        "#,
    );
    dir.write(
        "lib/math.aro",
        r#"
        (Add Numbers: Math) {
            <Extract> the <a> from the <input: a>.
            <Extract> the <b> from the <input: b>.
            <Compute> the <sum> from <a> + <b>.
            <Return> the <sum> for the <caller>.
        }
        "#,
    );
    dir.write(
        "lifecycle.aro",
        r#"(Application-End: Success) { <Log> "done" to the <console>. }"#,
    );

    let (app, console) = load(&dir);
    let outcome = app.run().await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(
        outcome.response,
        Some(Value::map([
            ("status", Value::from("OK")),
            ("data", Value::Int(5)),
        ]))
    );
    assert_eq!(console.lines(), vec!["Hello, ARO", "done"]);
}

#[tokio::test]
async fn start_failure_reaches_the_error_exit() {
    let dir = Scratch::new();
    dir.write(
        "main.aro",
        r#"
        (Application-Start: Fragile) {
            <Create> the <config> with { retries: 0 }.
            <Validate> the <retries: positive> from the <config: retries>.
        }
        (Application-End: Success) { <Log> "unexpected" to the <console>. }
        (Application-End: Error) { <Log> the <error> to the <console>. }
        "#,
    );
    let (app, console) = load(&dir);
    let outcome = app.run().await.unwrap();
    assert_eq!(outcome.exit, ExitKind::Error);
    let lines = console.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("retries must be positive"), "{lines:?}");
}

// =============================================================================
// Event-driven applications
// =============================================================================

#[tokio::test]
async fn keepalive_serves_events_until_shutdown() {
    let dir = Scratch::new();
    dir.write(
        "main.aro",
        r#"
        (Application-Start: Counter) {
            <Emit> a <Tick: event> with { n: 1 }.
            <Emit> a <Tick: event> with { n: 2 }.
            <Keepalive> the <application> for the <events>.
        }
        (Application-End: Success) { <Log> "shut down" to the <console>. }
        "#,
    );
    dir.write(
        "handlers.aro",
        r#"
        (Record Tick: Tick Handler) {
            <Extract> the <n> from the <event: n>.
            <Store> the <event> into the <tick-repository>.
        }
        "#,
    );

    let (app, console) = load(&dir);
    let engine = app.engine().clone();
    let handle = app.shutdown_handle();
    let task = tokio::spawn(async move { app.run().await });

    for _ in 0..100 {
        let stored = engine
            .repositories()
            .repository("tick-repository")
            .map(|r| r.all().len())
            .unwrap_or_default();
        if stored == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!task.is_finished());

    handle.signal();
    let outcome = task.await.unwrap().unwrap();
    assert!(outcome.waited);
    assert!(outcome.drained);
    assert_eq!(console.lines(), vec!["shut down"]);
    let stored = engine.repositories().repository("tick-repository").unwrap().all();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn check_errors_prevent_the_run() {
    let dir = Scratch::new();
    dir.write(
        "main.aro",
        r#"
        (Application-Start: Broken) {
            <Log> the <message> to the <console>.
        }
        "#,
    );
    let report = match Application::load(config(&dir)) {
        Err(ApplicationError::Check(report)) => report,
        Err(other) => panic!("expected a check failure, got {other}"),
        Ok(_) => panic!("expected a check failure"),
    };
    assert_eq!(report.errors().count(), 1);
    assert!(report.to_string().contains("message"));
}
