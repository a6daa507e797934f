//! Integration tests for Value
//!
//! Tests construction, equality, ordering, display and JSON conversion.

use std::cmp::Ordering;
use std::collections::HashSet;

use aro_foundation::{Value, ValueStream};
use proptest::prelude::*;

// =============================================================================
// Construction
// =============================================================================

#[test]
fn map_builder_orders_keys() {
    let v = Value::map([("b", 2), ("a", 1)]);
    let keys: Vec<&String> = v.as_map().unwrap().keys().collect();
    assert_eq!(keys, vec!["a", "b"]);
}

#[test]
fn nested_structures() {
    let user = Value::map([
        ("name", Value::from("Ada")),
        ("roles", Value::list(["admin", "dev"])),
    ]);
    assert_eq!(user.get("roles").and_then(Value::len), Some(2));
    assert_eq!(user.get("name").and_then(Value::as_str), Some("Ada"));
    assert_eq!(user.get("missing"), None);
}

#[test]
fn option_conversion() {
    assert_eq!(Value::from(None::<i64>), Value::Null);
    assert_eq!(Value::from(Some(3)), Value::Int(3));
}

#[test]
fn string_length_counts_characters() {
    assert_eq!(Value::from("héllo").len(), Some(5));
    assert_eq!(Value::Int(5).len(), None);
}

// =============================================================================
// Truthiness and type names
// =============================================================================

#[test]
fn only_null_and_false_are_falsy() {
    assert!(!Value::Null.is_truthy());
    assert!(!Value::Bool(false).is_truthy());
    assert!(Value::Int(0).is_truthy());
    assert!(Value::from("").is_truthy());
    assert!(Value::list(Vec::<Value>::new()).is_truthy());
}

#[test]
fn type_names() {
    assert_eq!(Value::Null.type_name(), "null");
    assert_eq!(Value::Float(1.0).type_name(), "float");
    assert_eq!(Value::Stream(ValueStream::new()).type_name(), "stream");
}

// =============================================================================
// Equality and ordering
// =============================================================================

#[test]
fn strict_equality_distinguishes_int_and_float() {
    assert_ne!(Value::Int(1), Value::Float(1.0));
    assert!(Value::Int(1).loosely_equals(&Value::Float(1.0)));
}

#[test]
fn loose_equality_is_structural() {
    let a = Value::map([("n", Value::list([1, 2]))]);
    let b = Value::map([("n", Value::list([Value::Float(1.0), Value::Float(2.0)]))]);
    assert!(a.loosely_equals(&b));
    assert!(!a.loosely_equals(&Value::map([("n", Value::list([1]))])));
}

#[test]
fn compare_mixed_numbers() {
    assert_eq!(Value::Int(2).compare(&Value::Float(2.5)), Some(Ordering::Less));
    assert_eq!(Value::from("b").compare(&Value::from("a")), Some(Ordering::Greater));
    assert_eq!(Value::Int(1).compare(&Value::from("1")), None);
}

#[test]
fn values_hash_consistently() {
    let set: HashSet<Value> = [Value::Int(1), Value::Int(1), Value::from("1")]
        .into_iter()
        .collect();
    assert_eq!(set.len(), 2);
}

// =============================================================================
// Display and JSON
// =============================================================================

#[test]
fn display_forms() {
    assert_eq!(Value::Null.to_string(), "null");
    assert_eq!(Value::Float(2.0).to_string(), "2.0");
    assert_eq!(Value::from("raw").to_string(), "raw");
    assert_eq!(
        Value::map([("a", Value::list([1, 2]))]).to_string(),
        "{a: [1, 2]}"
    );
}

#[test]
fn json_conversion_preserves_structure() {
    let v = Value::map([
        ("id", Value::Int(7)),
        ("score", Value::Float(1.5)),
        ("tags", Value::list(["x"])),
        ("none", Value::Null),
    ]);
    assert_eq!(Value::from(v.to_json()), v);
}

#[test]
fn streams_serialize_as_lists() {
    let stream = ValueStream::from_items([Value::Int(1), Value::Int(2)]);
    assert_eq!(
        Value::from(Value::Stream(stream).to_json()),
        Value::list([1, 2])
    );
}

// =============================================================================
// Properties
// =============================================================================

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        "[a-z]{0,8}".prop_map(Value::from),
    ]
}

proptest! {
    #[test]
    fn loose_equality_is_reflexive(v in scalar()) {
        prop_assert!(v.loosely_equals(&v));
    }

    #[test]
    fn int_compare_matches_native(a in any::<i64>(), b in any::<i64>()) {
        prop_assert_eq!(Value::Int(a).compare(&Value::Int(b)), Some(a.cmp(&b)));
    }
}
