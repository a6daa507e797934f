//! Integration tests for the parser and pretty printer
//!
//! Tests parsing of whole programs, error recovery and print/parse stability.

use aro_language::ast::ExitKind;
use aro_language::pretty::print_program;
use aro_language::{Preposition, Statement, SyntaxErrors, parse_expression, parse_program};

use crate::USER_SERVICE;

// =============================================================================
// Program structure
// =============================================================================

#[test]
fn parses_every_feature_set() {
    let program = parse_program(USER_SERVICE).unwrap();
    let names: Vec<&str> = program.feature_sets.iter().map(|fs| fs.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Application-Start", "createUser", "Send Welcome", "Application-End"]
    );
}

#[test]
fn classifies_feature_sets() {
    let program = parse_program(USER_SERVICE).unwrap();
    let fs = &program.feature_sets;
    assert!(fs[0].is_entry_point());
    assert_eq!(fs[1].handled_event(), None);
    assert_eq!(fs[2].handled_event(), Some("UserCreated"));
    assert_eq!(fs[3].exit_kind(), Some(ExitKind::Success));
    assert!(!fs.iter().any(|f| f.is_test()));
}

#[test]
fn statement_kinds() {
    let program = parse_program(USER_SERVICE).unwrap();
    let start = &program.feature_sets[0].statements;
    assert!(matches!(start[1], Statement::Publish(_)));

    let Statement::Aro(store) = &program.feature_sets[1].statements[3] else {
        panic!("expected an ARO statement");
    };
    assert_eq!(store.verb_key(), "store");
    assert_eq!(store.object.preposition, Preposition::Into);
    assert_eq!(store.object.base(), "user-repository");

    let Statement::Aro(send) = &program.feature_sets[2].statements[1] else {
        panic!("expected an ARO statement");
    };
    assert!(send.guard.is_some());
}

#[test]
fn qualified_nouns_keep_specifiers() {
    let program = parse_program(USER_SERVICE).unwrap();
    let Statement::Aro(extract) = &program.feature_sets[2].statements[0] else {
        panic!("expected an ARO statement");
    };
    assert_eq!(extract.object.base(), "event");
    assert_eq!(extract.object.key_path(), vec!["email"]);
    assert_eq!(
        extract.failure_phrase(),
        "Cannot extract the email from the event"
    );
}

#[test]
fn expressions_follow_precedence() {
    let printed = aro_language::pretty::print_expression(&parse_expression("1 + 2 * 3").unwrap());
    assert_eq!(printed, "1 + 2 * 3");
    let printed =
        aro_language::pretty::print_expression(&parse_expression("(1 + 2) * 3").unwrap());
    assert_eq!(printed, "(1 + 2) * 3");
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn parse_errors_are_collected_per_statement() {
    let source = "
        (Broken: Demo) {
            <Extract> the <a> the <b>.
            <Log> \"fine\" to the <console>.
            <Compute> <x> from.
        }
        (Fine: Demo) { <Log> \"ok\" to the <console>. }
    ";
    let Err(SyntaxErrors::Parse(errors)) = parse_program(source) else {
        panic!("expected parse errors");
    };
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].span.line, 3);
    assert_eq!(errors[1].span.line, 5);
}

#[test]
fn syntax_error_messages_carry_locations() {
    let err = parse_program("(A: B) { <Log> \"x\" the <console>. }").unwrap_err();
    assert_eq!(err.count(), 1);
    let (span, message) = &err.messages()[0];
    assert_eq!(span.line, 1);
    assert!(message.contains("preposition"), "{message}");
}

// =============================================================================
// Pretty printing
// =============================================================================

#[test]
fn printed_program_reparses_to_the_same_tree() {
    let program = parse_program(USER_SERVICE).unwrap();
    let printed = print_program(&program);
    let reparsed = parse_program(&printed).unwrap_or_else(|e| panic!("{e}\n{printed}"));
    assert_eq!(program.without_spans(), reparsed.without_spans());
}

#[test]
fn printing_is_idempotent() {
    let once = print_program(&parse_program(USER_SERVICE).unwrap());
    let twice = print_program(&parse_program(&once).unwrap());
    assert_eq!(once, twice);
}
