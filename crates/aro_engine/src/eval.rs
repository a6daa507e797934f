//! Expression evaluation against a context's bindings.

use std::cmp::Ordering;
use std::fmt::Write;

use aro_foundation::{ActionError, ActionResult, Value, ValueList, ValueMap};
use aro_language::ast::{BinaryOp, Expr, Literal, StringPart, UnaryOp};

use crate::context::ExecutionContext;

/// Evaluates an expression.
///
/// # Errors
///
/// Returns an action error for unbound nouns, missing properties, operand
/// type mismatches, integer overflow and division by zero.
pub fn evaluate(expr: &Expr, ctx: &ExecutionContext) -> ActionResult<Value> {
    match expr {
        Expr::Literal(literal, _) => Ok(literal_value(literal)),
        Expr::Interpolated(parts, _) => {
            let mut out = String::new();
            for part in parts {
                match part {
                    StringPart::Text(text) => out.push_str(text),
                    StringPart::Expr(inner) => {
                        // Writing to a String cannot fail.
                        let _ = write!(out, "{}", evaluate(inner, ctx)?);
                    }
                }
            }
            Ok(Value::from(out))
        }
        Expr::Noun(noun) => {
            let value = ctx.require(&noun.base)?;
            navigate(&value, &noun.base, &noun.key_path())
        }
        Expr::List(items, _) => items
            .iter()
            .map(|item| evaluate(item, ctx))
            .collect::<ActionResult<ValueList>>()
            .map(Value::List),
        Expr::Map(entries, _) => entries
            .iter()
            .map(|(key, value)| Ok((key.clone(), evaluate(value, ctx)?)))
            .collect::<ActionResult<ValueMap>>()
            .map(Value::Map),
        Expr::Unary(op, operand, _) => unary(*op, evaluate(operand, ctx)?),
        Expr::Binary(BinaryOp::And, lhs, rhs, _) => {
            if !evaluate(lhs, ctx)?.is_truthy() {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(evaluate(rhs, ctx)?.is_truthy()))
        }
        Expr::Binary(BinaryOp::Or, lhs, rhs, _) => {
            if evaluate(lhs, ctx)?.is_truthy() {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(evaluate(rhs, ctx)?.is_truthy()))
        }
        Expr::Binary(op, lhs, rhs, _) => binary(*op, &evaluate(lhs, ctx)?, &evaluate(rhs, ctx)?),
        Expr::Member(base, field, _) => {
            let value = evaluate(base, ctx)?;
            member(&value, field).ok_or_else(|| {
                ActionError::property_not_found(field.as_str(), value.type_name())
            })
        }
        Expr::Index(base, index, _) => index_into(&evaluate(base, ctx)?, &evaluate(index, ctx)?),
    }
}

/// Converts a literal into a value.
#[must_use]
pub fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::String(s) => Value::from(s.as_str()),
        Literal::Integer(n) => Value::Int(*n),
        Literal::Float(f) => Value::Float(*f),
        Literal::Boolean(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}

/// Walks `path` into `value`. `origin` names the starting value in
/// `PropertyNotFound` errors.
///
/// Map steps select fields, numeric steps index lists, and `length` or
/// `count` on a value without such a field yields its size.
///
/// # Errors
///
/// Returns `PropertyNotFound` if a step does not exist.
pub fn navigate(value: &Value, origin: &str, path: &[&str]) -> ActionResult<Value> {
    let mut current = value.clone();
    let mut walked = origin.to_string();
    for step in path {
        current = member(&current, step)
            .ok_or_else(|| ActionError::property_not_found(*step, walked.as_str()))?;
        walked.push('.');
        walked.push_str(step);
    }
    Ok(current)
}

fn member(value: &Value, field: &str) -> Option<Value> {
    match value {
        Value::Map(entries) if entries.contains_key(field) => entries.get(field).cloned(),
        Value::List(items) => match field.parse::<usize>() {
            Ok(index) => items.get(index).cloned(),
            Err(_) => size_of(value, field),
        },
        _ => size_of(value, field),
    }
}

fn size_of(value: &Value, field: &str) -> Option<Value> {
    match field {
        "length" | "count" => value.len().map(Value::from),
        _ => None,
    }
}

fn index_into(value: &Value, index: &Value) -> ActionResult<Value> {
    let missing = || ActionError::property_not_found(index.to_string(), value.type_name());
    match (value, index) {
        (Value::List(items), Value::Int(i)) => usize::try_from(*i)
            .ok()
            .and_then(|i| items.get(i).cloned())
            .ok_or_else(missing),
        (Value::Map(entries), Value::String(key)) => {
            entries.get(key.as_ref()).cloned().ok_or_else(missing)
        }
        (Value::String(s), Value::Int(i)) => usize::try_from(*i)
            .ok()
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::from(c.to_string()))
            .ok_or_else(missing),
        (Value::List(_) | Value::String(_), other) => {
            Err(ActionError::type_mismatch("integer", other.type_name()))
        }
        (Value::Map(_), other) => Err(ActionError::type_mismatch("string", other.type_name())),
        (other, _) => Err(ActionError::type_mismatch("list, map or string", other.type_name())),
    }
}

// =============================================================================
// Operators
// =============================================================================

fn unary(op: UnaryOp, value: Value) -> ActionResult<Value> {
    match (op, value) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Value::Int(n)) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| ActionError::runtime("integer overflow in negation")),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Neg, other) => Err(ActionError::type_mismatch("number", other.type_name())),
    }
}

/// Applies a non-short-circuit binary operator.
///
/// # Errors
///
/// Returns `TypeMismatch` for unsupported operand types and a runtime error
/// for overflow or division by zero.
pub fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> ActionResult<Value> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(lhs.loosely_equals(rhs))),
        BinaryOp::Ne => return Ok(Value::Bool(!lhs.loosely_equals(rhs))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = lhs.compare(rhs).ok_or_else(|| {
                ActionError::type_mismatch(lhs.type_name(), rhs.type_name())
            })?;
            return Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }));
        }
        BinaryOp::Concat => return Ok(concat(lhs, rhs)),
        BinaryOp::And => return Ok(Value::Bool(lhs.is_truthy() && rhs.is_truthy())),
        BinaryOp::Or => return Ok(Value::Bool(lhs.is_truthy() || rhs.is_truthy())),
        _ => {}
    }

    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => integer_arithmetic(op, *a, *b),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (a, b) = (lhs.as_number().unwrap_or_default(), rhs.as_number().unwrap_or_default());
            float_arithmetic(op, a, b)
        }
        (Value::String(a), Value::String(b)) if op == BinaryOp::Add => {
            Ok(Value::from(format!("{a}{b}")))
        }
        (Value::List(a), Value::List(b)) if op == BinaryOp::Add => {
            let mut joined = a.clone();
            joined.append(b.clone());
            Ok(Value::List(joined))
        }
        _ => Err(ActionError::type_mismatch(
            format!("numbers for '{}'", op.symbol()),
            format!("{} and {}", lhs.type_name(), rhs.type_name()),
        )),
    }
}

fn concat(lhs: &Value, rhs: &Value) -> Value {
    match (lhs, rhs) {
        (Value::List(a), Value::List(b)) => {
            let mut joined = a.clone();
            joined.append(b.clone());
            Value::List(joined)
        }
        _ => Value::from(format!("{lhs}{rhs}")),
    }
}

#[allow(clippy::cast_precision_loss)]
fn integer_arithmetic(op: BinaryOp, a: i64, b: i64) -> ActionResult<Value> {
    let overflow = || ActionError::runtime(format!("integer overflow in {a} {} {b}", op.symbol()));
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => {
            if b == 0 {
                return Err(ActionError::runtime("division by zero"));
            }
            match a.checked_rem(b) {
                None => None,
                Some(0) => a.checked_div(b),
                Some(_) => return Ok(Value::Float(a as f64 / b as f64)),
            }
        }
        BinaryOp::Rem => {
            if b == 0 {
                return Err(ActionError::runtime("division by zero"));
            }
            a.checked_rem(b)
        }
        _ => None,
    };
    result.map(Value::Int).ok_or_else(overflow)
}

fn float_arithmetic(op: BinaryOp, a: f64, b: f64) -> ActionResult<Value> {
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::Rem if b == 0.0 => {
            return Err(ActionError::runtime("division by zero"));
        }
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        _ => return Err(ActionError::runtime(format!("'{}' is not arithmetic", op.symbol()))),
    };
    Ok(Value::Float(value))
}
