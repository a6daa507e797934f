//! Integration tests for semantic analysis against the built-in actions.

use aro_language::{
    Analysis, AnalyzerConfig, DiagnosticKind, Severity, analyze, parse_program,
};

use crate::USER_SERVICE;

fn check(source: &str) -> Analysis {
    let program = parse_program(source).unwrap_or_else(|e| panic!("{e}"));
    analyze(&program, &aro_stdlib::builtins(), &AnalyzerConfig::new())
}

fn with_entry(body: &str) -> String {
    format!("(Application-Start: Demo) {{ }}\n(Work: Demo) {{ {body} }}")
}

#[test]
fn user_service_is_clean() {
    let analysis = check(USER_SERVICE);
    assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
}

#[test]
fn symbols_are_recorded_per_feature_set() {
    let analysis = check(USER_SERVICE);
    let symbols = analysis.symbols_for("createUser").unwrap();
    assert!(symbols.lookup("user").is_some());
    assert!(symbols.lookup("checked").is_some());
    assert!(analysis.symbols_for("nope").is_none());
}

#[test]
fn rebinding_is_reported() {
    let analysis = check(&with_entry(
        "<Create> the <x> with 1. <Compute> the <x> from 2 + 3.",
    ));
    assert!(analysis.has_errors());
    assert!(matches!(
        &analysis.errors().next().unwrap().kind,
        DiagnosticKind::ImmutabilityViolation { name } if name == "x"
    ));
}

#[test]
fn wrong_preposition_lists_alternatives() {
    let analysis = check(&with_entry("<Store> the <request> from the <user-repository>."));
    let diagnostic = analysis
        .errors()
        .find(|d| matches!(d.kind, DiagnosticKind::InvalidPreposition { .. }))
        .unwrap();
    let DiagnosticKind::InvalidPreposition { action, received, expected } = &diagnostic.kind else {
        panic!("expected an invalid preposition, got {diagnostic}");
    };
    assert_eq!(action, "store");
    assert_eq!(received, "from");
    assert_eq!(expected, &vec!["into".to_string(), "to".to_string()]);
    assert_eq!(diagnostic.feature_set.as_deref(), Some("Work"));
}

#[test]
fn published_names_cross_feature_sets_of_one_activity() {
    let analysis = check(
        "(Application-Start: Shop) {
            <Create> the <settings> with { currency: \"EUR\" }.
            <Publish> as <shop-settings> <settings>.
        }
        (Price: Shop) { <Compute> the <copy> from the <shop-settings>. }
        (Audit: Ledger) { <Compute> the <copy> from the <shop-settings>. }",
    );
    let undefined: Vec<&str> = analysis
        .errors()
        .filter_map(|d| d.feature_set.as_deref())
        .collect();
    assert_eq!(undefined, vec!["Audit"]);
}

#[test]
fn unknown_verbs_only_warn() {
    let analysis = check(&with_entry("<Frobnicate> the <thing> from the <request>."));
    assert!(!analysis.has_errors());
    let warning = analysis.warnings().next().unwrap();
    assert_eq!(warning.severity, Severity::Warning);
    assert!(matches!(&warning.kind, DiagnosticKind::UnknownAction { verb } if verb == "Frobnicate"));
}

#[test]
fn entry_point_rules() {
    let analysis = check("(Work: Demo) { }");
    assert!(analysis
        .errors()
        .any(|d| d.kind == DiagnosticKind::MissingEntryPoint));

    let analysis = check("(Application-Start: A) { } (Application-Start: B) { }");
    assert!(analysis
        .errors()
        .any(|d| d.kind == DiagnosticKind::DuplicateEntryPoint));
}
