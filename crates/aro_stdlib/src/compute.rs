//! Operations selected by the specifiers of a `<Compute>` result.
//!
//! `<Compute> the <total: sum> from the <prices>` applies [`Operation::Sum`].
//! Specifiers that name no operation are type annotations and leave the
//! value unchanged. Several operations apply left to right.
//!
//! Set operations take their right operand from the statement's `with`
//! clause and treat both sides as multisets: each right element can match
//! at most one left element.

use std::cmp::Ordering;

use aro_foundation::{ActionError, ActionResult, Value, ValueList};

use crate::type_mismatch;

/// A compute operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Characters of a string, elements of a list, entries of a map.
    Length,
    /// Uppercase a string.
    Uppercase,
    /// Lowercase a string.
    Lowercase,
    /// Strip surrounding whitespace.
    Trim,
    /// Sum of numbers.
    Sum,
    /// Arithmetic mean of numbers.
    Average,
    /// Smallest element.
    Min,
    /// Largest element.
    Max,
    /// Ascending order.
    Sort,
    /// Reverse a list or string.
    Reverse,
    /// Drop repeated elements, keeping first occurrences.
    Unique,
    /// First element.
    First,
    /// Last element.
    Last,
    /// Multiset intersection.
    Intersect,
    /// Multiset difference.
    Difference,
    /// Multiset union.
    Union,
}

impl Operation {
    /// Recognizes an operation specifier, case-insensitively.
    #[must_use]
    pub fn from_specifier(specifier: &str) -> Option<Self> {
        let op = match specifier.to_ascii_lowercase().as_str() {
            "length" | "count" => Self::Length,
            "uppercase" => Self::Uppercase,
            "lowercase" => Self::Lowercase,
            "trim" => Self::Trim,
            "sum" => Self::Sum,
            "avg" | "average" => Self::Average,
            "min" => Self::Min,
            "max" => Self::Max,
            "sort" => Self::Sort,
            "reverse" => Self::Reverse,
            "unique" => Self::Unique,
            "first" => Self::First,
            "last" => Self::Last,
            "intersect" => Self::Intersect,
            "difference" | "except" => Self::Difference,
            "union" => Self::Union,
            _ => return None,
        };
        Some(op)
    }

    /// Returns true for operations that need a right operand.
    #[must_use]
    pub const fn is_set_operation(self) -> bool {
        matches!(self, Self::Intersect | Self::Difference | Self::Union)
    }

    /// Applies the operation.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if `value` (or `operand`, for set operations)
    /// has the wrong type, and a runtime error on integer overflow.
    pub fn apply(self, value: &Value, operand: Option<&Value>) -> ActionResult<Value> {
        match self {
            Self::Length => value
                .len()
                .map(Value::from)
                .ok_or_else(|| type_mismatch("string, list or map", value)),
            Self::Uppercase => map_text(value, str::to_uppercase),
            Self::Lowercase => map_text(value, str::to_lowercase),
            Self::Trim => map_text(value, |s| s.trim().to_string()),
            Self::Sum => sum(&items(value)?),
            Self::Average => average(&items(value)?),
            Self::Min => extreme(&items(value)?, Ordering::Less),
            Self::Max => extreme(&items(value)?, Ordering::Greater),
            Self::Sort => sorted(items(value)?).map(Value::List),
            Self::Reverse => match value {
                Value::String(s) => Ok(Value::from(s.chars().rev().collect::<String>())),
                other => Ok(Value::List(items(other)?.iter().rev().cloned().collect())),
            },
            Self::Unique => Ok(Value::List(unique(&items(value)?))),
            Self::First => position(value, |list| list.front().cloned()),
            Self::Last => position(value, |list| list.back().cloned()),
            Self::Intersect | Self::Difference | Self::Union => {
                let left = items(value)?;
                let right = items(operand.unwrap_or(&Value::Null))?;
                let list = match self {
                    Self::Intersect => intersect(&left, &right),
                    Self::Difference => difference(&left, &right),
                    _ => union(&left, &right),
                };
                Ok(Value::List(list))
            }
        }
    }
}

/// Applies every operation named by `specifiers`, in order.
///
/// # Errors
///
/// Returns the first operation's error.
pub fn compute(specifiers: &[String], value: Value, operand: Option<&Value>) -> ActionResult<Value> {
    specifiers
        .iter()
        .filter_map(|s| Operation::from_specifier(s))
        .try_fold(value, |acc, op| op.apply(&acc, operand))
}

// =============================================================================
// Helpers
// =============================================================================

fn items(value: &Value) -> ActionResult<ValueList> {
    match value {
        Value::List(list) => Ok(list.clone()),
        Value::Stream(stream) => Ok(stream.snapshot().into_iter().collect()),
        other => Err(type_mismatch("list", other)),
    }
}

fn map_text(value: &Value, f: impl FnOnce(&str) -> String) -> ActionResult<Value> {
    value
        .as_str()
        .map(|s| Value::from(f(s)))
        .ok_or_else(|| type_mismatch("string", value))
}

fn position(value: &Value, pick: impl FnOnce(&ValueList) -> Option<Value>) -> ActionResult<Value> {
    match value {
        Value::String(s) => {
            let chars: ValueList = s.chars().map(|c| Value::from(c.to_string())).collect();
            Ok(pick(&chars).unwrap_or_default())
        }
        other => Ok(pick(&items(other)?).unwrap_or_default()),
    }
}

fn numbers(list: &ValueList) -> ActionResult<Vec<&Value>> {
    list.iter()
        .map(|v| match v {
            Value::Int(_) | Value::Float(_) => Ok(v),
            other => Err(type_mismatch("number", other)),
        })
        .collect()
}

fn sum(list: &ValueList) -> ActionResult<Value> {
    let values = numbers(list)?;
    if values.iter().all(|v| matches!(v, Value::Int(_))) {
        let mut total: i64 = 0;
        for n in values.iter().filter_map(|v| v.as_int()) {
            total = total
                .checked_add(n)
                .ok_or_else(|| ActionError::runtime("integer overflow in sum"))?;
        }
        return Ok(Value::Int(total));
    }
    Ok(Value::Float(values.iter().filter_map(|v| v.as_number()).sum()))
}

#[allow(clippy::cast_precision_loss)]
fn average(list: &ValueList) -> ActionResult<Value> {
    let values = numbers(list)?;
    if values.is_empty() {
        return Ok(Value::Null);
    }
    let total: f64 = values.iter().filter_map(|v| v.as_number()).sum();
    Ok(Value::Float(total / values.len() as f64))
}

fn compare(a: &Value, b: &Value) -> ActionResult<Ordering> {
    a.compare(b)
        .ok_or_else(|| ActionError::type_mismatch(a.type_name(), b.type_name()))
}

/// The element every other compares `wanted` against, or null if empty.
fn extreme(list: &ValueList, wanted: Ordering) -> ActionResult<Value> {
    let mut iter = list.iter();
    let Some(mut best) = iter.next() else {
        return Ok(Value::Null);
    };
    for candidate in iter {
        if compare(candidate, best)? == wanted {
            best = candidate;
        }
    }
    Ok(best.clone())
}

/// Stable ascending sort of mutually comparable values.
pub(crate) fn sorted(list: ValueList) -> ActionResult<ValueList> {
    let mut values: Vec<Value> = list.into_iter().collect();
    if let Some(first) = values.first() {
        for other in &values[1..] {
            compare(first, other)?;
        }
    }
    values.sort_by(|a, b| a.compare(b).unwrap_or(Ordering::Equal));
    Ok(values.into_iter().collect())
}

fn unique(list: &ValueList) -> ValueList {
    let mut seen: Vec<&Value> = Vec::new();
    let mut out = ValueList::new();
    for item in list {
        if !seen.iter().any(|s| s.loosely_equals(item)) {
            seen.push(item);
            out.push_back(item.clone());
        }
    }
    out
}

/// Removes the first unused element of `pool` equal to `item`.
fn take_match(pool: &mut [Option<&Value>], item: &Value) -> bool {
    let slot = pool
        .iter_mut()
        .find(|slot| matches!(**slot, Some(v) if v.loosely_equals(item)));
    match slot {
        Some(slot) => {
            *slot = None;
            true
        }
        None => false,
    }
}

fn intersect(left: &ValueList, right: &ValueList) -> ValueList {
    let mut pool: Vec<Option<&Value>> = right.iter().map(Some).collect();
    left.iter()
        .filter(|item| take_match(&mut pool, item))
        .cloned()
        .collect()
}

fn difference(left: &ValueList, right: &ValueList) -> ValueList {
    let mut pool: Vec<Option<&Value>> = right.iter().map(Some).collect();
    left.iter()
        .filter(|item| !take_match(&mut pool, item))
        .cloned()
        .collect()
}

fn union(left: &ValueList, right: &ValueList) -> ValueList {
    let mut pool: Vec<Option<&Value>> = left.iter().map(Some).collect();
    let extra: Vec<Value> = right
        .iter()
        .filter(|item| !take_match(&mut pool, item))
        .cloned()
        .collect();
    let mut out = left.clone();
    out.extend(extra);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(specifiers: &[&str], value: Value, operand: Option<Value>) -> ActionResult<Value> {
        let specifiers: Vec<String> = specifiers.iter().map(ToString::to_string).collect();
        compute(&specifiers, value, operand.as_ref())
    }

    #[test]
    fn unknown_specifiers_are_identity() {
        let value = Value::list([3, 1, 2]);
        assert_eq!(run(&["number"], value.clone(), None), Ok(value.clone()));
        assert_eq!(run(&[], value.clone(), None), Ok(value));
    }

    #[test]
    fn sizing_and_text() {
        assert_eq!(run(&["length"], Value::from("héllo"), None), Ok(Value::Int(5)));
        assert_eq!(run(&["count"], Value::list([1, 2]), None), Ok(Value::Int(2)));
        assert_eq!(run(&["uppercase"], Value::from("abc"), None), Ok(Value::from("ABC")));
        assert_eq!(run(&["LowerCase"], Value::from("AbC"), None), Ok(Value::from("abc")));
        assert_eq!(run(&["trim"], Value::from("  x "), None), Ok(Value::from("x")));
        assert_eq!(
            run(&["uppercase"], Value::Int(1), None).map_err(|e| e.code()),
            Err("type-mismatch")
        );
    }

    #[test]
    fn aggregates() {
        assert_eq!(run(&["sum"], Value::list([1, 2, 3]), None), Ok(Value::Int(6)));
        assert_eq!(run(&["sum"], Value::list([1.5, 2.0]), None), Ok(Value::Float(3.5)));
        assert_eq!(run(&["sum"], Value::list(Vec::<i64>::new()), None), Ok(Value::Int(0)));
        assert_eq!(run(&["avg"], Value::list([1, 2]), None), Ok(Value::Float(1.5)));
        assert_eq!(run(&["average"], Value::list(Vec::<i64>::new()), None), Ok(Value::Null));
        assert_eq!(run(&["min"], Value::list([3, 1, 2]), None), Ok(Value::Int(1)));
        assert_eq!(run(&["max"], Value::list([3.5, 1.0]), None), Ok(Value::Float(3.5)));
        assert!(run(&["sum"], Value::list(["a"]), None).is_err());
        assert!(run(&["sum"], Value::list([i64::MAX, 1]), None).is_err());
    }

    #[test]
    fn ordering_and_position() {
        assert_eq!(run(&["sort"], Value::list([3, 1, 2]), None), Ok(Value::list([1, 2, 3])));
        assert_eq!(run(&["sort", "reverse"], Value::list([3, 1, 2]), None), Ok(Value::list([3, 2, 1])));
        assert_eq!(run(&["reverse"], Value::from("abc"), None), Ok(Value::from("cba")));
        assert_eq!(run(&["unique"], Value::list([1, 2, 1, 3, 2]), None), Ok(Value::list([1, 2, 3])));
        assert_eq!(run(&["first"], Value::list([7, 8]), None), Ok(Value::Int(7)));
        assert_eq!(run(&["last"], Value::list([7, 8]), None), Ok(Value::Int(8)));
        assert_eq!(run(&["first"], Value::list(Vec::<i64>::new()), None), Ok(Value::Null));
        assert_eq!(run(&["first"], Value::from("xy"), None), Ok(Value::from("x")));
        assert!(run(&["sort"], Value::list([Value::Int(1), Value::from("a")]), None).is_err());
    }

    #[test]
    fn set_operations_are_multisets() {
        let intersect = |a: Value, b: Value| run(&["intersect"], a, Some(b));
        assert_eq!(
            intersect(Value::list([2, 3, 5]), Value::list([1, 2, 3, 4])),
            Ok(Value::list([2, 3]))
        );
        assert_eq!(
            intersect(Value::list([1, 2, 2, 3]), Value::list([2, 2, 2, 4])),
            Ok(Value::list([2, 2]))
        );
        assert_eq!(
            run(&["except"], Value::list([1, 2, 2, 3]), Some(Value::list([2]))),
            Ok(Value::list([1, 2, 3]))
        );
        assert_eq!(
            run(&["union"], Value::list([1, 2, 2]), Some(Value::list([2, 2, 2, 4]))),
            Ok(Value::list([1, 2, 2, 2, 4]))
        );
        assert_eq!(
            run(&["intersect"], Value::list([1]), None).map_err(|e| e.code()),
            Err("type-mismatch")
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn list(values: &[i64]) -> Value {
            Value::list(values.iter().copied())
        }

        proptest! {
            #[test]
            fn intersect_plus_difference_is_left(
                a in prop::collection::vec(0i64..5, 0..12),
                b in prop::collection::vec(0i64..5, 0..12),
            ) {
                let both = run(&["intersect"], list(&a), Some(list(&b))).unwrap();
                let rest = run(&["difference"], list(&a), Some(list(&b))).unwrap();
                prop_assert_eq!(both.len().unwrap() + rest.len().unwrap(), a.len());
            }

            #[test]
            fn union_contains_both_sides(
                a in prop::collection::vec(0i64..5, 0..12),
                b in prop::collection::vec(0i64..5, 0..12),
            ) {
                let joined = run(&["union"], list(&a), Some(list(&b))).unwrap();
                let len = joined.len().unwrap();
                prop_assert!(len >= a.len().max(b.len()));
                prop_assert!(len <= a.len() + b.len());
            }

            #[test]
            fn sort_is_ordered(values in prop::collection::vec(any::<i64>(), 0..20)) {
                let sorted = run(&["sort"], list(&values), None).unwrap();
                let out: Vec<i64> = sorted.as_list().unwrap().iter().filter_map(Value::as_int).collect();
                prop_assert!(out.windows(2).all(|w| w[0] <= w[1]));
                prop_assert_eq!(out.len(), values.len());
            }
        }
    }
}
