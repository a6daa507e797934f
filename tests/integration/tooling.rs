//! Checker, test runner and configuration tests
//!
//! Exercise the pieces the command line drives: `check`, `test` and the
//! `aro.toml` lookup.

use std::path::PathBuf;
use std::time::Duration;

use aro_engine::ServiceRegistry;
use aro_language::Severity;
use aro_runtime::{Application, CONFIG_FILE, RuntimeConfig, check_sources, run_tests, source};

use crate::Scratch;

#[test]
fn check_reports_problems_from_every_file() {
    let dir = Scratch::new();
    dir.write("main.aro", "(Application-Start: Demo) { <Log> \"hi\" to the <console>. }");
    dir.write("a/broken.aro", "(Broken: Demo) { <Log> \"unterminated to the <console>. }");
    dir.write(
        "b/users.aro",
        "(listUsers: User API) {
    <Compute> the <total> from the <missing>.
    <Frobnicate> the <thing> from the <total>.
}",
    );

    let files = source::load(dir.path()).unwrap();
    assert_eq!(files.len(), 3);
    let config = RuntimeConfig::new().analyzer_config();
    let report = check_sources(&files, &aro_stdlib::builtins(), &config);

    assert_eq!(report.program.feature_sets.len(), 2);
    let errors: Vec<_> = report.errors().collect();
    assert_eq!(errors.len(), 2, "{report}");
    assert!(errors[0].path.as_ref().is_some_and(|p| p.ends_with("a/broken.aro")));
    assert!(errors[1].path.as_ref().is_some_and(|p| p.ends_with("b/users.aro")));
    assert!(errors[1].message.contains("missing"));

    let warnings: Vec<_> = report.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].severity, Severity::Warning);
    assert_eq!(warnings[0].span.line, 3);
    assert!(report.to_string().ends_with("2 error(s), 1 warning(s)"));
}

#[tokio::test]
async fn test_feature_sets_run_from_disk() {
    let dir = Scratch::new();
    dir.write(
        "main.aro",
        r#"
        (Application-Start: Pricing) { <Log> "ready" to the <console>. }
        (Apply Discount: Pricing) {
            <Compute> the <discounted> from <input: price> * 9 / 10.
            <Return> the <discounted> for the <caller>.
        }
        "#,
    );
    dir.write(
        "tests/pricing.aro",
        r#"
        (discount applies: Pricing Test) {
            <Invoke> the <result> via the <apply-discount> with { price: 100 }.
            <Then> the <result> against 90.
        }
        (discount rounds: Pricing Test) {
            <Invoke> the <result> via the <apply-discount> with { price: 15 }.
            <Then> the <result> against 13.
        }
        "#,
    );
    let config = RuntimeConfig::new()
        .with_source_dir(dir.path())
        .with_handle_signals(false);
    let app = Application::load_with_services(config, ServiceRegistry::new()).unwrap();

    let report = run_tests(app.engine()).await;
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.passed(), 1);
    assert_eq!(report.results[1].name, "discount rounds");
    assert!(!report.results[1].passed());
    assert!(report.to_string().contains("test discount applies ... ok"));
}

#[test]
fn config_file_resolves_its_source_dir() {
    let dir = Scratch::new();
    let path = dir.write(
        CONFIG_FILE,
        "source_dir = \"app\"\nshutdown_grace_ms = 250\nhandle_signals = false\n",
    );
    let config = RuntimeConfig::from_file(&path).unwrap();
    assert_eq!(config.source_dir, dir.path().join(PathBuf::from("app")));
    assert_eq!(config.shutdown_grace, Duration::from_millis(250));
    assert!(!config.handle_signals);
}
