//! Response actions: produce output. None of them bind their result.

use aro_engine::services::{Console, FileSystem, MessageTransport};
use aro_engine::{ActionRegistry, BoxFuture, ExecutionContext};
use aro_foundation::{ActionError, ActionResult, Value};
use aro_language::ast::{ObjectDescriptor, ResultDescriptor};
use aro_language::contract::{ActionContract, ActionRole};
use aro_language::token::Preposition::{self, Against, For, Into, To, With};
use tracing::debug;

use crate::{consumed, render, text};

/// `<Return> an <OK: status> for the <request> with <user>`
pub const RETURN: ActionContract =
    ActionContract::new(ActionRole::Response, &["return", "respond"], &[For, To, With])
        .with_labels(&[For, To]);

/// `<Throw> a <NotFound: error> for the <user>`
pub const THROW: ActionContract =
    ActionContract::new(ActionRole::Response, &["throw", "raise", "fail"], &[For, With, Against])
        .with_labels(&[For]);

/// `<Log> "Server started" to the <console>`
pub const LOG: ActionContract =
    ActionContract::new(ActionRole::Response, &["log", "print", "output"], &[To, For, With])
        .with_labels(&[To, For]);

/// `<Send> the <welcome> to the <email-service>`
pub const SEND: ActionContract = ActionContract::new(
    ActionRole::Response,
    &["send", "notify", "dispatch"],
    &[To, For, Into],
)
.with_labels(&[To, For, Into]);

/// `<Write> the <report> to "report.json"`
pub const WRITE: ActionContract =
    ActionContract::new(ActionRole::Response, &["write"], &[To, Into]);

/// `<Emit> a <UserCreated: event> with <user>`
pub const EMIT: ActionContract =
    ActionContract::new(ActionRole::Response, &["emit", "trigger"], &[With, To, For])
        .with_labels(&[To, For]);

/// `<Then> the <total> against 10`
pub const THEN: ActionContract = ActionContract::new(
    ActionRole::Response,
    &["then", "assert", "expect"],
    &[Against, With, To, For],
)
.with_labels(&[For]);

/// Every response contract.
pub const CONTRACTS: &[ActionContract] = &[RETURN, THROW, LOG, SEND, WRITE, EMIT, THEN];

/// Console destinations that write to standard error.
const ERROR_STREAMS: [&str; 2] = ["stderr", "error"];

pub(crate) fn register(registry: &mut ActionRegistry) {
    registry.register_sync(RETURN, respond);
    registry.register_sync(THROW, throw);
    registry.register_sync(LOG, log);
    registry.register_async(SEND, send);
    registry.register_async(WRITE, write);
    registry.register_sync(EMIT, emit);
    registry.register_sync(THEN, then);
}

/// A bound result is the response. An unbound one is a status name, so
/// `<Return> an <OK: status> ... with <user>` responds
/// `{status: "OK", data: user}`.
fn respond(
    result: &ResultDescriptor,
    _: &ObjectDescriptor,
    ctx: &mut ExecutionContext,
) -> ActionResult<Value> {
    let response = if ctx.exists(result.base()) {
        consumed(result, ctx)?
    } else {
        let mut status = im::OrdMap::new();
        status.insert("status".to_string(), Value::from(result.base()));
        if let Some(data) = ctx.with_value() {
            status.insert("data".to_string(), data);
        }
        Value::Map(status)
    };
    ctx.respond(response.clone());
    Ok(response)
}

/// The result names the error type; the reason is the `with` value, else
/// the object's name.
fn throw(
    result: &ResultDescriptor,
    object: &ObjectDescriptor,
    ctx: &mut ExecutionContext,
) -> ActionResult<Value> {
    let (error_type, reason) = match ctx.literal() {
        Some(message) => ("Error".to_string(), message.to_string()),
        None => {
            let reason = ctx
                .with_value()
                .map_or_else(|| object.base().to_string(), |v| v.to_string());
            (result.base().to_string(), reason)
        }
    };
    Err(ActionError::thrown(error_type, reason))
}

fn log(
    result: &ResultDescriptor,
    object: &ObjectDescriptor,
    ctx: &mut ExecutionContext,
) -> ActionResult<Value> {
    let value = consumed(result, ctx)?;
    let console = ctx.service::<dyn Console>()?;
    let line = render(&value);
    if ERROR_STREAMS.contains(&object.base()) {
        console.eprint(&line);
    } else {
        console.print(&line);
    }
    Ok(value)
}

/// Sends the result to the destination the object names.
fn send<'a>(
    result: &'a ResultDescriptor,
    object: &'a ObjectDescriptor,
    ctx: &'a mut ExecutionContext,
) -> BoxFuture<'a, ActionResult<Value>> {
    Box::pin(async move {
        let value = consumed(result, ctx)?;
        let transport = ctx.service::<dyn MessageTransport>()?;
        transport.send(object.base(), value.clone()).await?;
        Ok(value)
    })
}

/// Writes strings as-is and other values as pretty JSON.
fn write<'a>(
    result: &'a ResultDescriptor,
    object: &'a ObjectDescriptor,
    ctx: &'a mut ExecutionContext,
) -> BoxFuture<'a, ActionResult<Value>> {
    Box::pin(async move {
        let value = consumed(result, ctx)?;
        let path = text(&ctx.resolve_object(object)?)?;
        let contents = match &value {
            Value::String(s) => s.to_string(),
            other => serde_json::to_string_pretty(&other.to_json())
                .map_err(|e| ActionError::io(e.to_string()))?,
        };
        let files = ctx.service::<dyn FileSystem>()?;
        files.write(&path, &contents).await?;
        Ok(value)
    })
}

/// The result names the event type. The payload is the `with` value, or
/// the object when it is introduced by `with`.
fn emit(
    result: &ResultDescriptor,
    object: &ObjectDescriptor,
    ctx: &mut ExecutionContext,
) -> ActionResult<Value> {
    let event_type = ctx
        .literal()
        .map_or_else(|| result.base().to_string(), |v| v.to_string());
    let payload = match ctx.with_value() {
        Some(payload) => payload,
        None if object.preposition == Preposition::With => ctx.resolve_object(object)?,
        None => Value::Null,
    };
    let dispatch = ctx.emit(&event_type, payload.clone());
    debug!(event = %event_type, handlers = dispatch.len(), "emitted event");
    Ok(payload)
}

/// Asserts that the result equals the `with` value, else the object.
fn then(
    result: &ResultDescriptor,
    object: &ObjectDescriptor,
    ctx: &mut ExecutionContext,
) -> ActionResult<Value> {
    let actual = consumed(result, ctx)?;
    let expected = match ctx.with_value() {
        Some(expected) => expected,
        None => ctx.resolve_object(object)?,
    };
    if actual.loosely_equals(&expected) {
        Ok(actual)
    } else {
        Err(ActionError::comparison_failed(format!(
            "expected {expected}, got {actual}"
        )))
    }
}
