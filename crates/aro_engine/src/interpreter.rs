//! The engine: feature sets plus everything their runs share, and the
//! statement sequencer that walks them.
//!
//! Statements of one run execute strictly in order. Suspension inside an
//! action is awaited at the dispatch boundary and is invisible to the
//! sequencer.

use std::fmt;
use std::sync::{Arc, Weak};

use aro_foundation::{ActionError, ActionResult, ErrorContext, Value};
use aro_language::ast::{
    AroStatement, EVENT_BINDING, EXPRESSION_BINDING, ExitKind, FeatureSet, ForEachLoop,
    INPUT_BINDING, LITERAL_BINDING, MatchExpression, Pattern, Program, PublishStatement,
    Statement, WHERE_BINDING, WITH_BINDING,
};
use aro_language::pretty::print_expression;
use aro_language::span::Span;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};
use uuid::Uuid;

use crate::BoxFuture;
use crate::action::ActionRegistry;
use crate::context::{ExecutionContext, PublishedStore, into_action_error};
use crate::error::{ExecutionError, Result};
use crate::eval::{evaluate, literal_value, navigate};
use crate::event::{Dispatch, Event, EventBus, EventHandler, SubscriptionId};
use crate::repository::{InMemoryRepositoryStore, RepositoryStore};
use crate::services::ServiceRegistry;

// =============================================================================
// Engine
// =============================================================================

/// A loaded program with its actions, services, repositories, published
/// values and event bus. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    feature_sets: Vec<Arc<FeatureSet>>,
    actions: ActionRegistry,
    services: ServiceRegistry,
    repositories: Arc<dyn RepositoryStore>,
    published: PublishedStore,
    events: EventBus,
    shutdown: CancellationToken,
}

/// Builds an [`Engine`].
pub struct EngineBuilder {
    program: Program,
    actions: ActionRegistry,
    services: ServiceRegistry,
    repositories: Option<Arc<dyn RepositoryStore>>,
}

impl EngineBuilder {
    /// Sets the action registry.
    #[must_use]
    pub fn with_actions(mut self, actions: ActionRegistry) -> Self {
        self.actions = actions;
        self
    }

    /// Sets the injected services.
    #[must_use]
    pub fn with_services(mut self, services: ServiceRegistry) -> Self {
        self.services = services;
        self
    }

    /// Sets the repository store. Defaults to an in-memory store.
    #[must_use]
    pub fn with_repositories(mut self, repositories: Arc<dyn RepositoryStore>) -> Self {
        self.repositories = Some(repositories);
        self
    }

    /// Builds the engine.
    #[must_use]
    pub fn build(self) -> Engine {
        Engine {
            inner: Arc::new(EngineInner {
                feature_sets: self.program.feature_sets.into_iter().map(Arc::new).collect(),
                actions: self.actions,
                services: self.services,
                repositories: self
                    .repositories
                    .unwrap_or_else(|| Arc::new(InMemoryRepositoryStore::new())),
                published: PublishedStore::new(),
                events: EventBus::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }
}

/// What a completed run produced.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    /// Name of the feature set that ran.
    pub feature_set: String,
    /// Execution id of the run's root context.
    pub execution_id: Uuid,
    /// The response set by a response action, if any.
    pub response: Option<Value>,
    /// True if the run entered the keep-alive wait.
    pub waiting: bool,
    /// Bindings of the root context when the run finished.
    pub bindings: im::HashMap<String, Value>,
}

impl Engine {
    /// Starts building an engine for `program`.
    #[must_use]
    pub fn builder(program: Program) -> EngineBuilder {
        EngineBuilder {
            program,
            actions: ActionRegistry::new(),
            services: ServiceRegistry::new(),
            repositories: None,
        }
    }

    /// The action registry.
    #[must_use]
    pub fn actions(&self) -> &ActionRegistry {
        &self.inner.actions
    }

    /// The injected services.
    #[must_use]
    pub fn services(&self) -> &ServiceRegistry {
        &self.inner.services
    }

    /// The repository store.
    #[must_use]
    pub fn repositories(&self) -> &dyn RepositoryStore {
        self.inner.repositories.as_ref()
    }

    /// Values published by business activity.
    #[must_use]
    pub fn published(&self) -> &PublishedStore {
        &self.inner.published
    }

    /// The event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Every loaded feature set in source order.
    #[must_use]
    pub fn feature_sets(&self) -> &[Arc<FeatureSet>] {
        &self.inner.feature_sets
    }

    /// Finds a feature set by name.
    #[must_use]
    pub fn feature_set(&self, name: &str) -> Option<Arc<FeatureSet>> {
        self.inner
            .feature_sets
            .iter()
            .find(|fs| fs.name == name)
            .cloned()
    }

    /// The `Application-Start` feature set, if loaded.
    #[must_use]
    pub fn entry_point(&self) -> Option<Arc<FeatureSet>> {
        self.inner
            .feature_sets
            .iter()
            .find(|fs| fs.is_entry_point())
            .cloned()
    }

    /// The `Application-End` feature set of the given kind, if loaded.
    #[must_use]
    pub fn exit_point(&self, kind: ExitKind) -> Option<Arc<FeatureSet>> {
        self.inner
            .feature_sets
            .iter()
            .find(|fs| fs.exit_kind() == Some(kind))
            .cloned()
    }

    /// Creates a fresh root context for a run of `feature_set`.
    #[must_use]
    pub fn root_context(&self, feature_set: &FeatureSet) -> ExecutionContext {
        ExecutionContext::root(
            self.clone(),
            &feature_set.name,
            &feature_set.business_activity,
        )
    }

    /// Runs a feature set to completion against `ctx`.
    ///
    /// # Errors
    ///
    /// Returns the first unrecovered error; the rest of the statement list
    /// is skipped.
    pub async fn run(
        &self,
        feature_set: &FeatureSet,
        mut ctx: ExecutionContext,
    ) -> Result<RunOutcome> {
        debug_assert!(
            Arc::ptr_eq(&self.inner, &ctx.engine().inner),
            "context belongs to another engine"
        );
        let span = info_span!(
            "feature_set",
            name = %feature_set.name,
            execution_id = %ctx.execution_id()
        );
        async move {
            debug!(activity = %feature_set.business_activity, "running feature set");
            execute_block(&feature_set.statements, &mut ctx).await?;
            debug!(responded = ctx.has_returned(), "feature set finished");
            Ok(RunOutcome {
                feature_set: feature_set.name.clone(),
                execution_id: ctx.execution_id(),
                response: ctx.response(),
                waiting: ctx.is_waiting(),
                bindings: ctx.bindings().clone(),
            })
        }
        .instrument(span)
        .await
    }

    /// Runs a feature set by name in a fresh root with `bindings` bound.
    ///
    /// # Errors
    ///
    /// Returns `FeatureSetNotFound` for an unknown name, or the run's error.
    pub async fn run_named<I>(&self, name: &str, bindings: I) -> Result<RunOutcome>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let feature_set = self
            .feature_set(name)
            .ok_or_else(|| ActionError::feature_set_not_found(name))?;
        let mut ctx = self.root_context(&feature_set);
        for (key, value) in bindings {
            ctx.bind(key, value)?;
        }
        self.run(&feature_set, ctx).await
    }

    /// Runs a feature set by name and returns its response, or null.
    ///
    /// A non-null input is bound whole as `input`; the callee reads fields
    /// with `<input: key>`.
    pub fn invoke(&self, name: &str, inputs: Value) -> BoxFuture<'static, ActionResult<Value>> {
        let engine = self.clone();
        let name = name.to_string();
        Box::pin(async move {
            let bindings: Vec<(String, Value)> = match inputs {
                Value::Null => Vec::new(),
                input => vec![(INPUT_BINDING.to_string(), input)],
            };
            let outcome = engine
                .run_named(&name, bindings)
                .await
                .map_err(into_action_error)?;
            Ok(outcome.response.unwrap_or_default())
        })
    }

    /// Subscribes every handler feature set (activity `<Event> Handler`) to
    /// its event, with its state guards.
    pub fn subscribe_handlers(&self) -> Vec<SubscriptionId> {
        self.inner
            .feature_sets
            .iter()
            .filter_map(|fs| {
                let event_type = fs.handled_event()?;
                let handler = Arc::new(FeatureSetHandler {
                    engine: Arc::downgrade(&self.inner),
                    feature_set: fs.clone(),
                });
                Some(self.inner.events.subscribe_guarded(
                    event_type,
                    fs.name.clone(),
                    fs.state_guards.clone(),
                    handler,
                ))
            })
            .collect()
    }

    /// Publishes an event on the bus.
    pub fn publish_event(&self, event_type: &str, payload: Value) -> Dispatch {
        self.inner.events.publish(event_type, payload)
    }

    /// A clone of the shutdown token.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// Releases every task waiting for shutdown.
    pub fn signal_shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    /// Returns true once shutdown has been signalled.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .inner
            .feature_sets
            .iter()
            .map(|fs| fs.name.as_str())
            .collect();
        f.debug_struct("Engine")
            .field("feature_sets", &names)
            .field("actions", &self.inner.actions)
            .field("services", &self.inner.services)
            .field("events", &self.inner.events)
            .finish_non_exhaustive()
    }
}

struct FeatureSetHandler {
    engine: Weak<EngineInner>,
    feature_set: Arc<FeatureSet>,
}

impl EventHandler for FeatureSetHandler {
    fn handle(&self, event: Event) -> BoxFuture<'static, Result<()>> {
        let engine = self.engine.upgrade().map(|inner| Engine { inner });
        let feature_set = self.feature_set.clone();
        Box::pin(async move {
            let Some(engine) = engine else {
                return Ok(());
            };
            let mut ctx = engine.root_context(&feature_set);
            ctx.bind(EVENT_BINDING, event.payload)?;
            engine.run(&feature_set, ctx).await.map(|_| ())
        })
    }
}

// =============================================================================
// Statement Sequencing
// =============================================================================

fn execute_block<'a>(
    statements: &'a [Statement],
    ctx: &'a mut ExecutionContext,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        for statement in statements {
            if ctx.has_returned() {
                break;
            }
            match statement {
                Statement::Aro(s) => execute_aro(s, ctx).await?,
                Statement::Match(m) => execute_match(m, ctx).await?,
                Statement::ForEach(l) => execute_for_each(l, ctx).await?,
                Statement::ParallelForEach(l) => execute_parallel(l, ctx).await?,
                Statement::Publish(p) => execute_publish(p, ctx)?,
            }
        }
        Ok(())
    })
}

/// Adds the failing statement's phrase, feature set and line to an action
/// error. Invariant failures pass through unchanged.
fn in_context(
    error: ExecutionError,
    phrase: impl FnOnce() -> String,
    span: Span,
    ctx: &ExecutionContext,
) -> ExecutionError {
    match error {
        ExecutionError::Action(e) => {
            let mut context = ErrorContext::new(phrase()).in_feature_set(ctx.feature_set());
            if span.line > 0 {
                context = context.at_line(span.line);
            }
            ExecutionError::Action(e.with_context(context))
        }
        invariant @ ExecutionError::Invariant(_) => invariant,
    }
}

async fn execute_aro(statement: &AroStatement, ctx: &mut ExecutionContext) -> Result<()> {
    ctx.clear_statement_scratch();
    let phrase = |where_value: Option<&Value>| {
        let mut phrase = statement.failure_phrase();
        if let (Some(clause), Some(value)) = (&statement.where_clause, where_value) {
            phrase.push_str(&format!(" where {} = {value}", clause.field));
        }
        phrase
    };

    if let Some(guard) = &statement.guard {
        let passed = evaluate(guard, ctx)
            .map_err(|e| in_context(e.into(), || phrase(None), statement.span, ctx))?
            .is_truthy();
        if !passed {
            debug!(
                verb = %statement.verb,
                line = statement.span.line,
                "guard false, skipping statement"
            );
            return Ok(());
        }
    }

    let where_value = bind_statement_scratch(statement, ctx)
        .map_err(|e| in_context(e.into(), || phrase(None), statement.span, ctx))?;

    let engine = ctx.engine().clone();
    let result = engine.actions().dispatch(statement, ctx).await;
    result
        .map(|_| ())
        .map_err(|e| in_context(e, || phrase(where_value.as_ref()), statement.span, ctx))
}

/// Evaluates the statement's literal, object expression, `with` and `where`
/// values into the reserved scratch names. Returns the `where` value.
fn bind_statement_scratch(
    statement: &AroStatement,
    ctx: &mut ExecutionContext,
) -> ActionResult<Option<Value>> {
    if let Some(literal) = &statement.literal {
        let value = evaluate(literal, ctx)?;
        ctx.set_scratch(LITERAL_BINDING, value);
    }
    if let Some(expression) = &statement.expression {
        let value = evaluate(expression, ctx)?;
        ctx.set_scratch(EXPRESSION_BINDING, value);
    }
    if let Some(with) = &statement.with {
        let value = evaluate(with, ctx)?;
        ctx.set_scratch(WITH_BINDING, value);
    }
    let Some(clause) = &statement.where_clause else {
        return Ok(None);
    };
    let value = evaluate(&clause.value, ctx)?;
    ctx.set_scratch(
        WHERE_BINDING,
        Value::map([
            ("field", Value::from(clause.field.as_str())),
            ("value", value.clone()),
        ]),
    );
    Ok(Some(value))
}

async fn execute_match(m: &MatchExpression, ctx: &mut ExecutionContext) -> Result<()> {
    let phrase = || format!("Cannot match on {}", print_expression(&m.subject));
    let subject =
        evaluate(&m.subject, ctx).map_err(|e| in_context(e.into(), phrase, m.span, ctx))?;

    for case in &m.cases {
        let matched = pattern_matches(&case.pattern, &subject, ctx)
            .map_err(|e| in_context(e.into(), phrase, case.span, ctx))?;
        if !matched {
            continue;
        }
        if let Some(guard) = &case.guard {
            let passed = evaluate(guard, ctx)
                .map_err(|e| in_context(e.into(), phrase, case.span, ctx))?
                .is_truthy();
            if !passed {
                continue;
            }
        }
        let mut child = ctx.child();
        return execute_block(&case.body, &mut child).await;
    }

    if let Some(otherwise) = &m.otherwise {
        let mut child = ctx.child();
        execute_block(otherwise, &mut child).await?;
    }
    Ok(())
}

fn pattern_matches(
    pattern: &Pattern,
    subject: &Value,
    ctx: &ExecutionContext,
) -> ActionResult<bool> {
    Ok(match pattern {
        Pattern::Wildcard => true,
        Pattern::Literal(literal) => literal_value(literal).loosely_equals(subject),
        Pattern::Noun(noun) => {
            let value = ctx.require(&noun.base)?;
            navigate(&value, &noun.base, &noun.key_path())?.loosely_equals(subject)
        }
    })
}

/// The elements a loop walks: a list's items, or a map's entries as
/// `{ key, value }` maps in key order.
fn loop_items(collection: Value) -> ActionResult<Vec<Value>> {
    match collection.materialize() {
        Value::List(items) => Ok(items.into_iter().collect()),
        Value::Map(entries) => Ok(entries
            .into_iter()
            .map(|(key, value)| Value::map([("key", Value::from(key)), ("value", value)]))
            .collect()),
        other => Err(ActionError::type_mismatch("list or map", other.type_name())),
    }
}

/// Creates the child context for one iteration, or `None` if the loop's
/// filter rejects the element.
fn iteration(
    l: &ForEachLoop,
    ctx: &ExecutionContext,
    index: usize,
    item: Value,
) -> Result<Option<ExecutionContext>> {
    let mut child = ctx.child();
    child.bind(l.item.as_str(), item)?;
    if let Some(index_name) = &l.index {
        child.bind(index_name.as_str(), Value::from(index))?;
    }
    if let Some(filter) = &l.filter {
        if !evaluate(filter, &child)?.is_truthy() {
            return Ok(None);
        }
    }
    Ok(Some(child))
}

fn iterations(
    l: &ForEachLoop,
    ctx: &ExecutionContext,
) -> Result<Vec<(usize, ExecutionContext)>> {
    let phrase = || format!("Cannot iterate over {}", print_expression(&l.collection));
    let collection = evaluate(&l.collection, ctx)
        .and_then(loop_items)
        .map_err(|e| in_context(e.into(), phrase, l.span, ctx))?;
    let mut children = Vec::with_capacity(collection.len());
    for (index, item) in collection.into_iter().enumerate() {
        let child =
            iteration(l, ctx, index, item).map_err(|e| in_context(e, phrase, l.span, ctx))?;
        if let Some(child) = child {
            children.push((index, child));
        }
    }
    Ok(children)
}

async fn execute_for_each(l: &ForEachLoop, ctx: &mut ExecutionContext) -> Result<()> {
    for (_, mut child) in iterations(l, ctx)? {
        if ctx.has_returned() {
            break;
        }
        execute_block(&l.body, &mut child).await?;
    }
    Ok(())
}

async fn execute_parallel(l: &ForEachLoop, ctx: &mut ExecutionContext) -> Result<()> {
    let children = iterations(l, ctx)?;
    let limit = l.concurrency.map(|n| Arc::new(Semaphore::new(n.max(1))));
    debug!(
        iterations = children.len(),
        concurrency = ?l.concurrency,
        "starting parallel loop"
    );

    let mut tasks = JoinSet::new();
    for (index, mut child) in children {
        let body = l.body.clone();
        let limit = limit.clone();
        tasks.spawn(
            async move {
                let _permit = match limit {
                    Some(semaphore) => Some(semaphore.acquire_owned().await.map_err(|e| {
                        (index, ExecutionError::Invariant(format!("concurrency limit closed: {e}")))
                    })?),
                    None => None,
                };
                execute_block(&body, &mut child).await.map_err(|e| (index, e))
            }
            .in_current_span(),
        );
    }

    let mut failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(failure)) => failures.push(failure),
            Err(e) => failures.push((
                usize::MAX,
                ExecutionError::Invariant(format!("parallel iteration panicked: {e}")),
            )),
        }
    }

    failures.sort_by_key(|(index, _)| *index);
    let mut failures = failures.into_iter();
    let Some((_, first)) = failures.next() else {
        return Ok(());
    };
    for (index, error) in failures {
        warn!(index, error = %error, "parallel iteration also failed");
    }
    Err(first)
}

fn execute_publish(p: &PublishStatement, ctx: &mut ExecutionContext) -> Result<()> {
    ctx.publish(&p.internal_name, &p.external_name).map_err(|e| {
        in_context(
            e,
            || format!("Cannot publish the {} as {}", p.internal_name, p.external_name),
            p.span,
            ctx,
        )
    })
}
