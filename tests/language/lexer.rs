//! Integration tests for the lexer
//!
//! Tests tokenization of whole ARO programs.

use aro_language::token::StringSegment;
use aro_language::{Article, LexError, Lexer, Preposition, TokenKind};
use proptest::prelude::*;

use crate::USER_SERVICE;

fn kinds(source: &str) -> Vec<TokenKind> {
    Lexer::tokenize(source)
        .unwrap_or_else(|e| panic!("{e}"))
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

// =============================================================================
// Whole programs
// =============================================================================

#[test]
fn program_tokenizes_to_eof() {
    let tokens = Lexer::tokenize(USER_SERVICE).unwrap();
    assert_eq!(tokens.last().map(|t| &t.kind), Some(&TokenKind::Eof));
    assert!(matches!(tokens[0].kind, TokenKind::Comment(_)));
}

#[test]
fn program_spans_are_ordered() {
    let tokens = Lexer::tokenize(USER_SERVICE).unwrap();
    for pair in tokens.windows(2) {
        assert!(pair[0].span.end <= pair[1].span.start, "{:?}", pair);
        assert!(pair[0].span.line <= pair[1].span.line);
    }
}

#[test]
fn feature_set_header() {
    assert_eq!(
        kinds("(Send Welcome: UserCreated Handler)"),
        vec![
            TokenKind::LParen,
            TokenKind::Identifier("Send".into()),
            TokenKind::Identifier("Welcome".into()),
            TokenKind::Colon,
            TokenKind::Identifier("UserCreated".into()),
            TokenKind::Identifier("Handler".into()),
            TokenKind::RParen,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn articles_and_prepositions_are_reserved() {
    assert_eq!(
        kinds("a <x> into an <y>"),
        vec![
            TokenKind::Article(Article::A),
            TokenKind::LAngle,
            TokenKind::Identifier("x".into()),
            TokenKind::RAngle,
            TokenKind::Preposition(Preposition::Into),
            TokenKind::Article(Article::An),
            TokenKind::LAngle,
            TokenKind::Identifier("y".into()),
            TokenKind::RAngle,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn interpolated_message() {
    let tokens = Lexer::tokenize(r#""Welcome, ${<user>.name}""#).unwrap();
    let TokenKind::String(segments) = &tokens[0].kind else {
        panic!("expected a string, got {:?}", tokens[0].kind);
    };
    assert_eq!(segments[0], StringSegment::Text("Welcome, ".into()));
    assert!(matches!(&segments[1], StringSegment::Interpolation(src, _) if src == "<user>.name"));
}

#[test]
fn first_error_stops_lexing() {
    let err = Lexer::tokenize("(A: B) {\n  <Log> \"never closed\n}").unwrap_err();
    assert!(matches!(err, LexError::UnterminatedString(span) if span.line == 2));
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn plain_words_lex_as_identifiers(word in "[b-z][a-z]{3,10}") {
        prop_assume!(Preposition::from_word(&word).is_none());
        prop_assume!(Article::from_word(&word).is_none());
        prop_assume!(!matches!(word.as_str(), "true" | "false" | "null"));
        prop_assert_eq!(kinds(&word), vec![TokenKind::Identifier(word.clone()), TokenKind::Eof]);
    }

    #[test]
    fn integers_round_trip(n in 0i64..=i64::MAX) {
        prop_assert_eq!(kinds(&n.to_string()), vec![TokenKind::Integer(n), TokenKind::Eof]);
    }
}
