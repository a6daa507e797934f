//! Own actions: derive new values from data the feature set already holds.

use std::cmp::Ordering;

use aro_engine::{ActionRegistry, BoxFuture, ExecutionContext};
use aro_foundation::{ActionError, ActionResult, Value, ValueList};
use aro_language::ast::{ObjectDescriptor, ResultDescriptor};
use aro_language::contract::{ActionContract, ActionRole};
use aro_language::token::Preposition::{Against, By, For, From, Into, On, To, Via, With};

use crate::compute::{compute as apply_operations, sorted};
use crate::type_mismatch;

/// `<Compute> the <total: sum> from the <prices>`
pub const COMPUTE: ActionContract = ActionContract::new(
    ActionRole::Own,
    &["compute", "calculate", "derive"],
    &[From, For, With, Against, On, By],
);

/// `<Validate> the <email: required email> from the <input: email>`
pub const VALIDATE: ActionContract = ActionContract::new(
    ActionRole::Own,
    &["validate", "verify", "check"],
    &[From, For, Against, With],
);

/// `<Compare> the <cheaper: less> from the <price> with <budget>`
pub const COMPARE: ActionContract =
    ActionContract::new(ActionRole::Own, &["compare", "match"], &[From, With, Against]);

/// `<Transform> the <count: integer> from the <text>`
pub const TRANSFORM: ActionContract = ActionContract::new(
    ActionRole::Own,
    &["transform", "convert", "map"],
    &[From, Into, To],
);

/// `<Create> the <user> with { name: "Ada" }`
pub const CREATE: ActionContract =
    ActionContract::new(ActionRole::Own, &["create", "build", "make"], &[From, With, For]);

/// `<Update> the <renamed> from the <user> with { name: "Grace" }`
pub const UPDATE: ActionContract = ActionContract::new(
    ActionRole::Own,
    &["update", "modify", "change", "set"],
    &[From, With, On, For],
);

/// `<Filter> the <active> from the <users> where status = "active"`
pub const FILTER: ActionContract =
    ActionContract::new(ActionRole::Own, &["filter", "select"], &[From, By]);

/// `<Sort> the <ranked: score descending> from the <players>`
pub const SORT: ActionContract = ActionContract::new(ActionRole::Own, &["sort", "order"], &[From, By]);

/// `<Merge> the <profile> from the <user> with <settings>`
pub const MERGE: ActionContract = ActionContract::new(
    ActionRole::Own,
    &["merge", "combine", "join"],
    &[From, With, Into],
);

/// `<Given> the <limit> with 10`
pub const GIVEN: ActionContract = ActionContract::new(ActionRole::Own, &["given"], &[With, From]);

/// `<Invoke> the <sum> via the <add-numbers> with { a: 1, b: 2 }`
pub const INVOKE: ActionContract =
    ActionContract::new(ActionRole::Own, &["invoke", "run"], &[Via]).with_labels(&[Via]);

/// Every own contract.
pub const CONTRACTS: &[ActionContract] = &[
    COMPUTE, VALIDATE, COMPARE, TRANSFORM, CREATE, UPDATE, FILTER, SORT, MERGE, GIVEN, INVOKE,
];

pub(crate) fn register(registry: &mut ActionRegistry) {
    registry.register_sync(COMPUTE, compute);
    registry.register_sync(VALIDATE, validate);
    registry.register_sync(COMPARE, compare);
    registry.register_sync(TRANSFORM, transform);
    registry.register_sync(CREATE, create);
    registry.register_sync(UPDATE, update);
    registry.register_sync(FILTER, filter);
    registry.register_sync(SORT, sort);
    registry.register_sync(MERGE, merge);
    registry.register_sync(GIVEN, create);
    registry.register_async(INVOKE, invoke);
}

/// The statement's `with` value, which the action cannot do without.
fn required_with(ctx: &ExecutionContext, verb: &str) -> ActionResult<Value> {
    ctx.with_value()
        .ok_or_else(|| ActionError::runtime(format!("{verb} needs a 'with' value")))
}

// =============================================================================
// Compute
// =============================================================================

fn compute(
    result: &ResultDescriptor,
    object: &ObjectDescriptor,
    ctx: &mut ExecutionContext,
) -> ActionResult<Value> {
    let value = ctx.resolve_object(object)?;
    let operand = ctx.with_value();
    apply_operations(result.specifiers(), value, operand.as_ref())
}

// =============================================================================
// Validate
// =============================================================================

/// Applies every rule specifier; specifiers that are not rules are ignored.
fn validate(
    result: &ResultDescriptor,
    object: &ObjectDescriptor,
    ctx: &mut ExecutionContext,
) -> ActionResult<Value> {
    let value = ctx.resolve_object(object)?;
    for rule in result.specifiers() {
        check_rule(rule, &value, result.base())?;
    }
    Ok(value)
}

fn check_rule(rule: &str, value: &Value, subject: &str) -> ActionResult<()> {
    let failure = match rule.to_ascii_lowercase().as_str() {
        "required" if value.is_null() => "is required",
        "non-empty" if value.len().is_none_or(|n| n == 0) => "must not be empty",
        "email" if !value.as_str().is_some_and(is_email) => "is not a valid email address",
        "numeric" if !is_numeric(value) => "is not numeric",
        "positive" if !value.as_number().is_some_and(|n| n > 0.0) => "must be positive",
        _ => return Ok(()),
    };
    Err(ActionError::validation_failed(format!("{subject} {failure}")))
}

fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !s.chars().any(char::is_whitespace)
}

fn is_numeric(value: &Value) -> bool {
    value.as_number().is_some() || value.as_str().is_some_and(|s| s.trim().parse::<f64>().is_ok())
}

// =============================================================================
// Compare and transform
// =============================================================================

/// Modes: `equal` (default), `less`, `greater`, `ordering` (-1, 0 or 1).
fn compare(
    result: &ResultDescriptor,
    object: &ObjectDescriptor,
    ctx: &mut ExecutionContext,
) -> ActionResult<Value> {
    let left = ctx.resolve_object(object)?;
    let right = required_with(ctx, "compare")?;
    let ordering = || {
        left.compare(&right)
            .ok_or_else(|| ActionError::type_mismatch(left.type_name(), right.type_name()))
    };
    if result.has_specifier("less") {
        return Ok(Value::Bool(ordering()? == Ordering::Less));
    }
    if result.has_specifier("greater") {
        return Ok(Value::Bool(ordering()? == Ordering::Greater));
    }
    if result.has_specifier("ordering") {
        let n: i64 = match ordering()? {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        };
        return Ok(Value::Int(n));
    }
    Ok(Value::Bool(left.loosely_equals(&right)))
}

/// Targets: `string`, `integer`, `float`, `boolean`, `list`. Without a
/// target the value passes through.
fn transform(
    result: &ResultDescriptor,
    object: &ObjectDescriptor,
    ctx: &mut ExecutionContext,
) -> ActionResult<Value> {
    let value = ctx.resolve_object(object)?;
    let target = ["string", "integer", "float", "boolean", "list"]
        .into_iter()
        .find(|t| result.has_specifier(t));
    match target {
        Some("string") => Ok(Value::from(value.to_string())),
        Some("integer") => to_integer(&value),
        Some("float") => to_float(&value),
        Some("boolean") => to_boolean(&value),
        Some("list") => Ok(to_list(value)),
        _ => Ok(value),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn to_integer(value: &Value) -> ActionResult<Value> {
    match value {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(f) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| ActionError::type_mismatch("integer", format!("\"{s}\""))),
        other => Err(type_mismatch("integer", other)),
    }
}

fn to_float(value: &Value) -> ActionResult<Value> {
    match value {
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| ActionError::type_mismatch("float", format!("\"{s}\""))),
        other => other
            .as_number()
            .map(Value::Float)
            .ok_or_else(|| type_mismatch("float", other)),
    }
}

fn to_boolean(value: &Value) -> ActionResult<Value> {
    match value {
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::Int(n) => Ok(Value::Bool(*n != 0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(Value::Bool(true)),
            "false" | "no" | "0" => Ok(Value::Bool(false)),
            _ => Err(ActionError::type_mismatch("boolean", format!("\"{s}\""))),
        },
        other => Err(type_mismatch("boolean", other)),
    }
}

fn to_list(value: Value) -> Value {
    match value {
        Value::List(_) => value,
        Value::Stream(_) => value.materialize(),
        Value::Map(entries) => Value::List(entries.values().cloned().collect()),
        Value::Null => Value::List(ValueList::new()),
        scalar => Value::list([scalar]),
    }
}

// =============================================================================
// Construction
// =============================================================================

/// `Create` and `Given`: the `with` value, else the object.
fn create(
    _: &ResultDescriptor,
    object: &ObjectDescriptor,
    ctx: &mut ExecutionContext,
) -> ActionResult<Value> {
    ctx.with_value()
        .map_or_else(|| ctx.resolve_object(object), Ok)
}

/// With a field specifier, sets that field to the `with` value; otherwise
/// merges the `with` map over the object.
fn update(
    result: &ResultDescriptor,
    object: &ObjectDescriptor,
    ctx: &mut ExecutionContext,
) -> ActionResult<Value> {
    let base = ctx.resolve_object(object)?;
    let changes = required_with(ctx, "update")?;
    let Value::Map(entries) = &base else {
        return Err(type_mismatch("map", &base));
    };
    if let Some(field) = result.specifiers().first() {
        return Ok(Value::Map(entries.update(field.clone(), changes)));
    }
    match changes {
        Value::Map(changes) => Ok(Value::Map(changes.union(entries.clone()))),
        other => Err(type_mismatch("map", &other)),
    }
}

fn merge(
    _: &ResultDescriptor,
    object: &ObjectDescriptor,
    ctx: &mut ExecutionContext,
) -> ActionResult<Value> {
    let left = ctx.resolve_object(object)?;
    let right = required_with(ctx, "merge")?;
    match (left, right) {
        (Value::Map(a), Value::Map(b)) => Ok(Value::Map(b.union(a))),
        (Value::List(mut a), Value::List(b)) => {
            a.append(b);
            Ok(Value::List(a))
        }
        (Value::String(a), Value::String(b)) => Ok(Value::from(format!("{a}{b}"))),
        (a, b) => Err(ActionError::type_mismatch(a.type_name(), b.type_name())),
    }
}

// =============================================================================
// Collections
// =============================================================================

/// Keeps the elements whose `where` field equals the clause value.
fn filter(
    _: &ResultDescriptor,
    object: &ObjectDescriptor,
    ctx: &mut ExecutionContext,
) -> ActionResult<Value> {
    let items = list_of(ctx.resolve_object(object)?)?;
    let Some((field, wanted)) = ctx.where_clause() else {
        return Ok(Value::List(items));
    };
    Ok(Value::List(
        items
            .into_iter()
            .filter(|item| item.get(&field).is_some_and(|v| v.loosely_equals(&wanted)))
            .collect(),
    ))
}

/// The first specifier other than `ascending`/`descending` names the sort
/// field. Elements without the field sort last.
fn sort(
    result: &ResultDescriptor,
    object: &ObjectDescriptor,
    ctx: &mut ExecutionContext,
) -> ActionResult<Value> {
    let items = list_of(ctx.resolve_object(object)?)?;
    let descending = result.has_specifier("descending");
    let field = result
        .specifiers()
        .iter()
        .find(|s| !s.eq_ignore_ascii_case("ascending") && !s.eq_ignore_ascii_case("descending"));

    let ordered = match field {
        Some(field) => sort_by_field(items, field, descending)?,
        None if descending => sorted(items)?.iter().rev().cloned().collect(),
        None => sorted(items)?.into_iter().collect(),
    };
    Ok(Value::list(ordered))
}

fn list_of(value: Value) -> ActionResult<ValueList> {
    match value.materialize() {
        Value::List(items) => Ok(items),
        other => Err(type_mismatch("list", &other)),
    }
}

fn sort_by_field(items: ValueList, field: &str, descending: bool) -> ActionResult<Vec<Value>> {
    let (mut keyed, missing): (Vec<Value>, Vec<Value>) = items
        .into_iter()
        .partition(|item| item.get(field).is_some_and(|v| !v.is_null()));
    let key = |item: &Value| item.get(field).cloned().unwrap_or_default();
    if let Some(first) = keyed.first().map(key) {
        for item in &keyed[1..] {
            let other = key(item);
            if first.compare(&other).is_none() {
                return Err(ActionError::type_mismatch(first.type_name(), other.type_name()));
            }
        }
    }
    keyed.sort_by(|a, b| key(a).compare(&key(b)).unwrap_or(Ordering::Equal));
    if descending {
        keyed.reverse();
    }
    keyed.extend(missing);
    Ok(keyed)
}

// =============================================================================
// Invoke
// =============================================================================

/// Runs the feature set the `via` label names, with the `with` value bound
/// there as `input`, and yields its response.
fn invoke<'a>(
    _: &'a ResultDescriptor,
    object: &'a ObjectDescriptor,
    ctx: &'a mut ExecutionContext,
) -> BoxFuture<'a, ActionResult<Value>> {
    Box::pin(async move {
        let name = feature_set_name(ctx, object.base());
        let inputs = ctx.with_value().unwrap_or_default();
        ctx.invoke(&name, inputs).await
    })
}

/// Matches a label such as `add-numbers` against feature set names like
/// `Add Numbers`, ignoring case and treating hyphens as spaces.
fn feature_set_name(ctx: &ExecutionContext, label: &str) -> String {
    let normalize = |s: &str| s.replace('-', " ").to_lowercase();
    let wanted = normalize(label);
    ctx.engine()
        .feature_sets()
        .iter()
        .find(|fs| fs.name == label || normalize(&fs.name) == wanted)
        .map_or_else(|| label.to_string(), |fs| fs.name.clone())
}
