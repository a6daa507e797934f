//! Execution contexts: the binding scopes statements run against.
//!
//! A root context is created for every independent run of a feature set.
//! Loops, match bodies and parallel iterations run in children. A child
//! starts from a structural-sharing snapshot of its parent's bindings, so
//! writes to it never reach the parent.
//!
//! The response slot and the wait flag belong to the task, not to a single
//! scope: a root and every descendant share them, so a `Return` inside a
//! loop body ends the whole run.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use aro_foundation::{ActionError, ActionResult, Value};
use aro_language::ast::{
    EXPRESSION_BINDING, LITERAL_BINDING, ObjectDescriptor, WHERE_BINDING, WITH_BINDING,
};
use uuid::Uuid;

use crate::BoxFuture;
use crate::error::{ExecutionError, RebindError};
use crate::eval::navigate;
use crate::event::Dispatch;
use crate::interpreter::Engine;
use crate::repository::Repository;

/// Names cleared before every statement.
pub const SCRATCH_BINDINGS: [&str; 4] =
    [LITERAL_BINDING, EXPRESSION_BINDING, WITH_BINDING, WHERE_BINDING];

// =============================================================================
// Metadata
// =============================================================================

/// Read-only facts about a context.
#[derive(Debug)]
pub struct ContextMeta {
    execution_id: Uuid,
    feature_set: String,
    business_activity: String,
    parent: Option<Arc<ContextMeta>>,
}

impl ContextMeta {
    /// Unique id of this context.
    #[must_use]
    pub const fn execution_id(&self) -> Uuid {
        self.execution_id
    }

    /// Name of the running feature set.
    #[must_use]
    pub fn feature_set(&self) -> &str {
        &self.feature_set
    }

    /// Business activity of the running feature set.
    #[must_use]
    pub fn business_activity(&self) -> &str {
        &self.business_activity
    }

    /// The context this one was created from, if any.
    #[must_use]
    pub fn parent(&self) -> Option<&ContextMeta> {
        self.parent.as_deref()
    }

    /// Number of ancestors; zero for a root.
    #[must_use]
    pub fn depth(&self) -> usize {
        std::iter::successors(self.parent(), |meta| meta.parent()).count()
    }
}

#[derive(Debug, Default)]
struct TaskState {
    response: Mutex<Option<Value>>,
    returned: AtomicBool,
    waiting: AtomicBool,
}

// =============================================================================
// Published Store
// =============================================================================

/// Runtime-wide store of published values, keyed by business activity.
#[derive(Debug, Default)]
pub struct PublishedStore {
    by_activity: RwLock<HashMap<String, HashMap<String, Value>>>,
}

impl PublishedStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up `name` as published by `activity`.
    #[must_use]
    pub fn get(&self, activity: &str, name: &str) -> Option<Value> {
        self.by_activity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(activity)
            .and_then(|names| names.get(name))
            .cloned()
    }

    /// Publishes `value` as `name` for `activity`. A later run of the same
    /// publishing statement replaces the earlier value.
    pub fn insert(&self, activity: &str, name: &str, value: Value) {
        self.by_activity
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(activity.to_string())
            .or_default()
            .insert(name.to_string(), value);
    }

    /// Returns the names published by `activity`, sorted.
    #[must_use]
    pub fn names(&self, activity: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .by_activity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(activity)
            .map(|names| names.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

// =============================================================================
// Execution Context
// =============================================================================

/// The binding scope a statement runs against, plus access to services,
/// repositories, events and the task's response.
#[derive(Clone)]
pub struct ExecutionContext {
    engine: Engine,
    meta: Arc<ContextMeta>,
    bindings: im::HashMap<String, Value>,
    task: Arc<TaskState>,
}

impl ExecutionContext {
    /// Creates a root context for a run of `feature_set`.
    #[must_use]
    pub fn root(engine: Engine, feature_set: &str, business_activity: &str) -> Self {
        Self {
            engine,
            meta: Arc::new(ContextMeta {
                execution_id: Uuid::new_v4(),
                feature_set: feature_set.to_string(),
                business_activity: business_activity.to_string(),
                parent: None,
            }),
            bindings: im::HashMap::new(),
            task: Arc::new(TaskState::default()),
        }
    }

    /// Creates a child that starts with a snapshot of this context's
    /// bindings and shares its task state.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            meta: Arc::new(ContextMeta {
                execution_id: Uuid::new_v4(),
                feature_set: self.meta.feature_set.clone(),
                business_activity: self.meta.business_activity.clone(),
                parent: Some(self.meta.clone()),
            }),
            bindings: self.bindings.clone(),
            task: self.task.clone(),
        }
    }

    /// The engine this context runs in.
    #[must_use]
    pub const fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Metadata of this context.
    #[must_use]
    pub fn meta(&self) -> &ContextMeta {
        &self.meta
    }

    /// Unique id of this context.
    #[must_use]
    pub fn execution_id(&self) -> Uuid {
        self.meta.execution_id
    }

    /// Name of the running feature set.
    #[must_use]
    pub fn feature_set(&self) -> &str {
        &self.meta.feature_set
    }

    /// Business activity of the running feature set.
    #[must_use]
    pub fn business_activity(&self) -> &str {
        &self.meta.business_activity
    }

    /// Returns true if this context has no parent.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.meta.parent.is_none()
    }

    // -------------------------------------------------------------------------
    // Variables
    // -------------------------------------------------------------------------

    /// Looks up a name locally, then among values published for this
    /// context's business activity.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<Value> {
        self.bindings.get(name).cloned().or_else(|| {
            self.engine
                .published()
                .get(&self.meta.business_activity, name)
        })
    }

    /// Looks up a name that must be bound.
    ///
    /// # Errors
    ///
    /// Returns `UndefinedVariable` if the name does not resolve.
    pub fn require(&self, name: &str) -> ActionResult<Value> {
        self.resolve(name)
            .ok_or_else(|| ActionError::undefined_variable(name))
    }

    /// Returns true if the name resolves.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
            || self
                .engine
                .published()
                .get(&self.meta.business_activity, name)
                .is_some()
    }

    /// Binds a name in this context.
    ///
    /// Names starting with `_` are framework names and may be rebound.
    ///
    /// # Errors
    ///
    /// Returns [`RebindError`] if the name is already bound here, even to an
    /// equal value.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) -> Result<(), RebindError> {
        let name = name.into();
        if !name.starts_with('_') && self.bindings.contains_key(&name) {
            return Err(RebindError { name });
        }
        self.bindings.insert(name, value);
        Ok(())
    }

    /// The bindings visible in this context, without published values.
    #[must_use]
    pub const fn bindings(&self) -> &im::HashMap<String, Value> {
        &self.bindings
    }

    pub(crate) fn set_scratch(&mut self, name: &'static str, value: Value) {
        self.bindings.insert(name.to_string(), value);
    }

    pub(crate) fn clear_statement_scratch(&mut self) {
        for name in SCRATCH_BINDINGS {
            self.bindings.remove(name);
        }
    }

    /// The statement's literal result value, if it has one.
    #[must_use]
    pub fn literal(&self) -> Option<Value> {
        self.bindings.get(LITERAL_BINDING).cloned()
    }

    /// The statement's `with` value, if it has one.
    #[must_use]
    pub fn with_value(&self) -> Option<Value> {
        self.bindings.get(WITH_BINDING).cloned()
    }

    /// The statement's `where field = value` clause, if it has one.
    #[must_use]
    pub fn where_clause(&self) -> Option<(String, Value)> {
        let clause = self.bindings.get(WHERE_BINDING)?;
        let field = clause.get("field")?.as_str()?.to_string();
        let value = clause.get("value").cloned().unwrap_or_default();
        Some((field, value))
    }

    /// Resolves an object descriptor: the statement's object expression,
    /// or the named value navigated along the object's key path.
    ///
    /// # Errors
    ///
    /// Returns `UndefinedVariable` if the base is unbound and
    /// `PropertyNotFound` if a key path step is missing.
    pub fn resolve_object(&self, object: &ObjectDescriptor) -> ActionResult<Value> {
        if object.is_expression() {
            return self.require(EXPRESSION_BINDING);
        }
        let value = self.require(object.base())?;
        navigate(&value, object.base(), &object.key_path())
    }

    // -------------------------------------------------------------------------
    // Services, repositories and events
    // -------------------------------------------------------------------------

    /// Looks up an injected service by capability type.
    ///
    /// # Errors
    ///
    /// Returns `MissingService` if none is registered.
    pub fn service<T>(&self) -> ActionResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.engine.services().require::<T>()
    }

    /// Looks up a named repository.
    ///
    /// # Errors
    ///
    /// Returns `UndefinedRepository` if the store does not know the name.
    pub fn repository(&self, name: &str) -> ActionResult<Arc<dyn Repository>> {
        self.engine.repositories().repository(name)
    }

    /// Publishes an event on the engine's bus.
    pub fn emit(&self, event_type: &str, payload: Value) -> Dispatch {
        self.engine.publish_event(event_type, payload)
    }

    /// Makes the value bound to `internal` visible as `external` to every
    /// feature set of this business activity, and binds `external` here.
    ///
    /// # Errors
    ///
    /// Returns an action error if `internal` is unbound, and an invariant
    /// error if `external` is already bound in this context.
    pub fn publish(&mut self, internal: &str, external: &str) -> crate::Result<()> {
        let value = self.require(internal)?;
        self.engine
            .published()
            .insert(&self.meta.business_activity, external, value.clone());
        if internal != external {
            self.bind(external, value)?;
        }
        Ok(())
    }

    /// Runs another feature set by name and returns its response, or null
    /// if it did not respond.
    pub fn invoke(&self, feature_set: &str, inputs: Value) -> BoxFuture<'static, ActionResult<Value>> {
        self.engine.invoke(feature_set, inputs)
    }

    // -------------------------------------------------------------------------
    // Response
    // -------------------------------------------------------------------------

    /// Sets the task's response and ends the run after the current
    /// statement.
    pub fn respond(&self, value: Value) {
        *self
            .task
            .response
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(value);
        self.task.returned.store(true, Ordering::SeqCst);
    }

    /// The task's response, if one was set.
    #[must_use]
    pub fn response(&self) -> Option<Value> {
        self.task
            .response
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns true once the task has responded.
    #[must_use]
    pub fn has_returned(&self) -> bool {
        self.task.returned.load(Ordering::SeqCst)
    }

    // -------------------------------------------------------------------------
    // Wait state
    // -------------------------------------------------------------------------

    /// Marks the task as a long-running application waiting for shutdown.
    pub fn enter_wait(&self) {
        self.task.waiting.store(true, Ordering::SeqCst);
    }

    /// Returns true if the task entered the wait state.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.task.waiting.load(Ordering::SeqCst)
    }

    /// Completes once shutdown has been signalled.
    pub async fn await_shutdown(&self) {
        let token = self.engine.shutdown_token();
        token.cancelled().await;
    }

    /// Signals shutdown to every waiting task.
    pub fn signal_shutdown(&self) {
        self.engine.signal_shutdown();
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.bindings.keys().collect();
        names.sort();
        f.debug_struct("ExecutionContext")
            .field("feature_set", &self.meta.feature_set)
            .field("execution_id", &self.meta.execution_id)
            .field("depth", &self.meta.depth())
            .field("bindings", &names)
            .finish_non_exhaustive()
    }
}

/// Lifts an invariant failure into an action error at boundaries that only
/// carry action errors, such as `invoke`.
pub(crate) fn into_action_error(error: ExecutionError) -> ActionError {
    match error {
        ExecutionError::Action(e) => e,
        ExecutionError::Invariant(message) => ActionError::runtime(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aro_language::ast::QualifiedNoun;
    use aro_language::span::Span;
    use aro_language::token::Preposition;

    fn context() -> ExecutionContext {
        let engine = Engine::builder(aro_language::Program::default()).build();
        ExecutionContext::root(engine, "Demo", "Testing")
    }

    fn object(base: &str, specifiers: &[&str]) -> ObjectDescriptor {
        ObjectDescriptor::new(
            Preposition::From,
            QualifiedNoun::new(
                base,
                specifiers.iter().map(ToString::to_string).collect(),
                Span::none(),
            ),
        )
    }

    #[test]
    fn rebinding_is_rejected_even_for_equal_values() {
        let mut ctx = context();
        ctx.bind("x", Value::from(1)).unwrap();
        let err = ctx.bind("x", Value::from(1)).unwrap_err();
        assert_eq!(err.name, "x");
        assert_eq!(ctx.require("x").unwrap(), Value::from(1));
    }

    #[test]
    fn framework_names_rebind() {
        let mut ctx = context();
        ctx.bind("_tmp", Value::from(1)).unwrap();
        ctx.bind("_tmp", Value::from(2)).unwrap();
        assert_eq!(ctx.resolve("_tmp"), Some(Value::from(2)));
    }

    #[test]
    fn child_writes_never_reach_parent() {
        let mut parent = context();
        parent.bind("outer", Value::from("o")).unwrap();

        let mut child = parent.child();
        child.bind("inner", Value::from("i")).unwrap();

        assert!(child.exists("outer"));
        assert!(!parent.exists("inner"));
        assert_eq!(child.meta().depth(), 1);
        assert_eq!(child.meta().parent().map(ContextMeta::execution_id), Some(parent.execution_id()));
    }

    #[test]
    fn children_share_the_response_slot() {
        let parent = context();
        let child = parent.child().child();
        child.respond(Value::from("done"));
        assert!(parent.has_returned());
        assert_eq!(parent.response(), Some(Value::from("done")));
    }

    #[test]
    fn resolve_object_navigates_key_paths() {
        let mut ctx = context();
        ctx.bind(
            "request",
            Value::map([("parameters", Value::map([("id", Value::from(7))]))]),
        )
        .unwrap();

        let found = ctx.resolve_object(&object("request", &["parameters", "id"])).unwrap();
        assert_eq!(found, Value::from(7));

        let err = ctx.resolve_object(&object("request", &["body"])).unwrap_err();
        assert_eq!(err.code(), "property-not-found");

        let err = ctx.resolve_object(&object("missing", &[])).unwrap_err();
        assert_eq!(err, ActionError::undefined_variable("missing"));
    }

    #[test]
    fn scratch_bindings_are_cleared() {
        let mut ctx = context();
        ctx.set_scratch(WITH_BINDING, Value::from(1));
        ctx.set_scratch(
            WHERE_BINDING,
            Value::map([("field", Value::from("id")), ("value", Value::from(3))]),
        );
        assert_eq!(ctx.with_value(), Some(Value::from(1)));
        assert_eq!(ctx.where_clause(), Some(("id".to_string(), Value::from(3))));

        ctx.clear_statement_scratch();
        assert_eq!(ctx.with_value(), None);
        assert_eq!(ctx.where_clause(), None);
    }

    #[test]
    fn published_values_are_scoped_by_activity() {
        let mut publisher = context();
        publisher.bind("config", Value::from("on")).unwrap();
        publisher.publish("config", "app-config").unwrap();

        let engine = publisher.engine().clone();
        let same = ExecutionContext::root(engine.clone(), "Reader", "Testing");
        let other = ExecutionContext::root(engine, "Reader", "Elsewhere");

        assert_eq!(same.require("app-config").unwrap(), Value::from("on"));
        assert!(!other.exists("app-config"));
        assert_eq!(publisher.resolve("app-config"), Some(Value::from("on")));
    }

    #[test]
    fn missing_service_is_reported() {
        let ctx = context();
        let err = ctx.service::<dyn crate::services::Console>().err().unwrap();
        assert_eq!(err.code(), "missing-service");
    }

    #[tokio::test]
    async fn await_shutdown_completes_after_signal() {
        let ctx = context();
        ctx.enter_wait();
        assert!(ctx.is_waiting());

        let waiter = ctx.clone();
        let handle = tokio::spawn(async move { waiter.await_shutdown().await });
        ctx.signal_shutdown();
        handle.await.unwrap();
    }
}
