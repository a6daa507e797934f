//! Server actions: start and stop long-running listeners, and keep the
//! application alive until shutdown.

use aro_engine::services::ServerHost;
use aro_engine::{ActionRegistry, BoxFuture, ExecutionContext};
use aro_foundation::{ActionResult, Value};
use aro_language::ast::{ObjectDescriptor, ResultDescriptor};
use aro_language::contract::{ActionContract, ActionRole};
use aro_language::token::Preposition::{self, At, For, From, On, Via, With};
use tracing::info;

const SERVER_PREPOSITIONS: &[Preposition] = &[With, For, On, At, From, Via];

/// `<Start> the <http-server> with { port: 8080 }`
pub const START: ActionContract =
    ActionContract::new(ActionRole::Server, &["start"], SERVER_PREPOSITIONS).with_labels(&[For]);

/// `<Keepalive> the <application> for the <events>`
pub const KEEPALIVE: ActionContract =
    ActionContract::new(ActionRole::Server, &["keepalive", "wait"], SERVER_PREPOSITIONS)
        .with_labels(SERVER_PREPOSITIONS);

/// `<Stop> the <http-server> for the <application>`
pub const STOP: ActionContract =
    ActionContract::new(ActionRole::Server, &["stop"], SERVER_PREPOSITIONS)
        .with_labels(SERVER_PREPOSITIONS);

/// Every server contract.
pub const CONTRACTS: &[ActionContract] = &[START, KEEPALIVE, STOP];

pub(crate) fn register(registry: &mut ActionRegistry) {
    registry.register_async(START, start);
    registry.register_async(KEEPALIVE, keepalive);
    registry.register_async(STOP, stop);
}

/// Starts the server the result names. The configuration is the `with`
/// value, or the object when it is introduced by `with`.
fn start<'a>(
    result: &'a ResultDescriptor,
    object: &'a ObjectDescriptor,
    ctx: &'a mut ExecutionContext,
) -> BoxFuture<'a, ActionResult<Value>> {
    Box::pin(async move {
        let config = match ctx.with_value() {
            Some(config) => config,
            None if object.preposition == With => ctx.resolve_object(object)?,
            None => Value::Null,
        };
        let host = ctx.service::<dyn ServerHost>()?;
        let server = host.start(result.base(), config).await?;
        info!(server = result.base(), "server started");
        Ok(server)
    })
}

/// Parks the task until shutdown is signalled.
fn keepalive<'a>(
    _: &'a ResultDescriptor,
    _: &'a ObjectDescriptor,
    ctx: &'a mut ExecutionContext,
) -> BoxFuture<'a, ActionResult<Value>> {
    Box::pin(async move {
        ctx.enter_wait();
        info!(feature_set = ctx.feature_set(), "waiting for shutdown");
        ctx.await_shutdown().await;
        Ok(Value::Null)
    })
}

fn stop<'a>(
    result: &'a ResultDescriptor,
    _: &'a ObjectDescriptor,
    ctx: &'a mut ExecutionContext,
) -> BoxFuture<'a, ActionResult<Value>> {
    Box::pin(async move {
        let host = ctx.service::<dyn ServerHost>()?;
        host.stop(result.base()).await?;
        info!(server = result.base(), "server stopped");
        Ok(Value::Null)
    })
}
