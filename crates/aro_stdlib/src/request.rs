//! Request actions: bring data into a feature set.

use aro_engine::services::{FileSystem, HttpClient};
use aro_engine::{ActionRegistry, BoxFuture, ExecutionContext};
use aro_foundation::{ActionError, ActionResult, Value};
use aro_language::ast::{ObjectDescriptor, ResultDescriptor};
use aro_language::contract::{ActionContract, ActionRole};
use aro_language::token::Preposition::{For, From, Via};

use crate::text;

/// `<Extract> the <id> from the <request: parameters id>`
pub const EXTRACT: ActionContract =
    ActionContract::new(ActionRole::Request, &["extract", "parse", "get"], &[From, Via, For]);

/// `<Retrieve> the <user> from the <user-repository> where id = <id>`
pub const RETRIEVE: ActionContract =
    ActionContract::new(ActionRole::Request, &["retrieve", "fetch", "load"], &[From, Via, For]);

/// `<Request> the <weather> from the <weather-url>`
pub const REQUEST: ActionContract =
    ActionContract::new(ActionRole::Request, &["request", "call"], &[From, Via, For]);

/// `<Read> the <config: json> from "config.json"`
pub const READ: ActionContract = ActionContract::new(ActionRole::Request, &["read"], &[From]);

/// `<List> the <files> from the <directory>`
pub const LIST: ActionContract = ActionContract::new(ActionRole::Request, &["list"], &[From, For]);

/// Every request contract.
pub const CONTRACTS: &[ActionContract] = &[EXTRACT, RETRIEVE, REQUEST, READ, LIST];

const HTTP_METHODS: [&str; 5] = ["get", "post", "put", "patch", "delete"];

pub(crate) fn register(registry: &mut ActionRegistry) {
    registry.register_sync(EXTRACT, extract);
    registry.register_sync(RETRIEVE, retrieve);
    registry.register_async(REQUEST, request);
    registry.register_async(READ, read);
    registry.register_async(LIST, list);
}

fn extract(
    _: &ResultDescriptor,
    object: &ObjectDescriptor,
    ctx: &mut ExecutionContext,
) -> ActionResult<Value> {
    ctx.resolve_object(object)
}

/// Without a `where` clause, every stored value. With one, the first match;
/// an `all` or `list` specifier asks for every match instead.
fn retrieve(
    result: &ResultDescriptor,
    object: &ObjectDescriptor,
    ctx: &mut ExecutionContext,
) -> ActionResult<Value> {
    let repository = ctx.repository(object.base())?;
    let Some((field, value)) = ctx.where_clause() else {
        return Ok(Value::list(repository.all()));
    };
    let matches = repository.find(&field, &value);
    if result.has_specifier("all") || result.has_specifier("list") {
        return Ok(Value::list(matches));
    }
    matches.into_iter().next().ok_or_else(|| {
        ActionError::runtime(format!(
            "no {} in {} has {field} = {value}",
            result.base(),
            object.base()
        ))
    })
}

/// The method is a result specifier; it defaults to POST when a `with`
/// body is given and GET otherwise.
fn request<'a>(
    result: &'a ResultDescriptor,
    object: &'a ObjectDescriptor,
    ctx: &'a mut ExecutionContext,
) -> BoxFuture<'a, ActionResult<Value>> {
    Box::pin(async move {
        let url = text(&ctx.resolve_object(object)?)?;
        let body = ctx.with_value();
        let method = HTTP_METHODS
            .iter()
            .find(|m| result.has_specifier(m))
            .map_or_else(
                || if body.is_some() { "POST" } else { "GET" }.to_string(),
                |m| m.to_ascii_uppercase(),
            );
        let client = ctx.service::<dyn HttpClient>()?;
        client.request(&method, &url, body).await
    })
}

/// A `json` specifier parses the file, `lines` splits it.
fn read<'a>(
    result: &'a ResultDescriptor,
    object: &'a ObjectDescriptor,
    ctx: &'a mut ExecutionContext,
) -> BoxFuture<'a, ActionResult<Value>> {
    Box::pin(async move {
        let path = text(&ctx.resolve_object(object)?)?;
        let files = ctx.service::<dyn FileSystem>()?;
        let contents = files.read(&path).await?;
        if result.has_specifier("json") {
            return serde_json::from_str::<serde_json::Value>(&contents)
                .map(Value::from)
                .map_err(|e| ActionError::io(format!("{path} is not valid JSON: {e}")));
        }
        if result.has_specifier("lines") {
            return Ok(Value::list(contents.lines().map(str::to_string)));
        }
        Ok(Value::from(contents))
    })
}

fn list<'a>(
    _: &'a ResultDescriptor,
    object: &'a ObjectDescriptor,
    ctx: &'a mut ExecutionContext,
) -> BoxFuture<'a, ActionResult<Value>> {
    Box::pin(async move {
        let path = text(&ctx.resolve_object(object)?)?;
        let files = ctx.service::<dyn FileSystem>()?;
        Ok(Value::list(files.list(&path).await?))
    })
}
