//! Publish/subscribe routing of events to handlers.
//!
//! Subscriptions are indexed by exact event type, with a separate wildcard
//! bucket, so a publish looks up its subscribers directly instead of
//! scanning every subscription. Each publish takes a snapshot of the
//! matching subscribers and runs every handler as an independent task.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use aro_foundation::Value;
use aro_language::ast::StateGuard;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

use crate::BoxFuture;
use crate::error::{ExecutionError, Result};

/// Event type that subscribes to every event.
pub const WILDCARD: &str = "*";

/// A published event.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    /// The event's type name, e.g. `UserCreated`.
    pub event_type: String,
    /// The event's data.
    pub payload: Value,
}

impl Event {
    /// Creates an event.
    #[must_use]
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }
}

/// Something that runs when a subscribed event is published.
pub trait EventHandler: Send + Sync {
    /// Handles one event.
    fn handle(&self, event: Event) -> BoxFuture<'static, Result<()>>;
}

impl<F> EventHandler for F
where
    F: Fn(Event) -> BoxFuture<'static, Result<()>> + Send + Sync,
{
    fn handle(&self, event: Event) -> BoxFuture<'static, Result<()>> {
        self(event)
    }
}

/// Identifies a subscription for later removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// A handler registered for one event type or the wildcard.
#[derive(Clone)]
pub struct Subscription {
    /// The subscription's id.
    pub id: SubscriptionId,
    /// The subscribed event type, or [`WILDCARD`].
    pub event_type: String,
    /// Name of what runs, for logging; usually a feature set.
    pub target: String,
    /// Conditions on the payload; all must hold.
    pub guards: Vec<StateGuard>,
    handler: Arc<dyn EventHandler>,
}

impl Subscription {
    /// Returns true if the payload satisfies every guard.
    #[must_use]
    pub fn accepts(&self, payload: &Value) -> bool {
        guards_match(&self.guards, payload)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("event_type", &self.event_type)
            .field("target", &self.target)
            .field("guards", &self.guards)
            .finish_non_exhaustive()
    }
}

/// Returns true if every guard holds for `payload`.
///
/// A guard holds if the field at its path, rendered as text, equals one of
/// its values ignoring case. A missing field fails the guard.
#[must_use]
pub fn guards_match(guards: &[StateGuard], payload: &Value) -> bool {
    guards.iter().all(|guard| {
        let field = guard
            .field_path
            .iter()
            .try_fold(payload, |value, step| value.get(step));
        field.is_some_and(|value| {
            let actual = value.to_string().to_lowercase();
            guard.values.iter().any(|v| v.to_lowercase() == actual)
        })
    })
}

// =============================================================================
// Dispatch
// =============================================================================

/// Handler runs started by one publish.
#[derive(Debug, Default)]
pub struct Dispatch {
    handles: Vec<JoinHandle<Result<()>>>,
}

impl Dispatch {
    /// Number of handlers started.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true if no handler was started.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Waits for every handler and returns their results in subscription
    /// order. A panicked handler is reported as an invariant failure.
    pub async fn wait(self) -> Vec<Result<()>> {
        let mut results = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            results.push(match handle.await {
                Ok(result) => result,
                Err(e) => Err(ExecutionError::Invariant(format!("event handler panicked: {e}"))),
            });
        }
        results
    }
}

// =============================================================================
// Event Bus
// =============================================================================

#[derive(Default)]
struct Buckets {
    by_type: HashMap<String, Vec<Arc<Subscription>>>,
    wildcard: Vec<Arc<Subscription>>,
}

/// Routes published events to subscribed handlers.
pub struct EventBus {
    buckets: RwLock<Buckets>,
    next_id: AtomicU64,
    tracker: TaskTracker,
    closed: AtomicBool,
}

impl EventBus {
    /// Creates a bus with no subscriptions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(Buckets::default()),
            next_id: AtomicU64::new(1),
            tracker: TaskTracker::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Subscribes `handler` to `event_type`, or to every event if it is
    /// [`WILDCARD`].
    pub fn subscribe(
        &self,
        event_type: &str,
        target: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> SubscriptionId {
        self.subscribe_guarded(event_type, target, Vec::new(), handler)
    }

    /// Subscribes with payload guards that must all hold for the handler
    /// to run.
    pub fn subscribe_guarded(
        &self,
        event_type: &str,
        target: impl Into<String>,
        guards: Vec<StateGuard>,
        handler: Arc<dyn EventHandler>,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscription = Arc::new(Subscription {
            id,
            event_type: event_type.to_string(),
            target: target.into(),
            guards,
            handler,
        });
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        if event_type == WILDCARD {
            buckets.wildcard.push(subscription);
        } else {
            buckets
                .by_type
                .entry(event_type.to_string())
                .or_default()
                .push(subscription);
        }
        id
    }

    /// Removes a subscription. Returns false if it was not found.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        let Buckets { by_type, wildcard } = &mut *buckets;
        if let Some(index) = wildcard.iter().position(|s| s.id == id) {
            wildcard.remove(index);
            return true;
        }
        let mut emptied = None;
        let mut found = false;
        for (event_type, subscriptions) in by_type.iter_mut() {
            if let Some(index) = subscriptions.iter().position(|s| s.id == id) {
                subscriptions.remove(index);
                found = true;
                if subscriptions.is_empty() {
                    emptied = Some(event_type.clone());
                }
                break;
            }
        }
        if let Some(event_type) = emptied {
            by_type.remove(&event_type);
        }
        found
    }

    /// Snapshot of the subscribers for `event_type`: type-specific ones
    /// first, then wildcard ones.
    #[must_use]
    pub fn subscribers(&self, event_type: &str) -> Vec<Arc<Subscription>> {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        buckets
            .by_type
            .get(event_type)
            .into_iter()
            .flatten()
            .chain(buckets.wildcard.iter())
            .cloned()
            .collect()
    }

    /// Total number of subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        buckets.by_type.values().map(Vec::len).sum::<usize>() + buckets.wildcard.len()
    }

    /// Publishes an event, starting one task per subscriber whose guards
    /// accept the payload. Must be called from within a Tokio runtime.
    ///
    /// After [`close`](Self::close) the event is dropped with a warning.
    pub fn publish(&self, event_type: &str, payload: Value) -> Dispatch {
        if self.is_closed() {
            warn!(event_type, "event bus closed, dropping event");
            return Dispatch::default();
        }

        let subscribers = self.subscribers(event_type);
        debug!(event_type, subscribers = subscribers.len(), "publishing event");

        let mut handles = Vec::with_capacity(subscribers.len());
        for subscription in subscribers {
            if !subscription.accepts(&payload) {
                debug!(
                    event_type,
                    target = %subscription.target,
                    "state guards not met, skipping subscriber"
                );
                continue;
            }
            let event = Event::new(event_type, payload.clone());
            handles.push(self.tracker.spawn(async move {
                let result = subscription.handler.handle(event).await;
                if let Err(e) = &result {
                    error!(
                        event_type = %subscription.event_type,
                        target = %subscription.target,
                        error = %e,
                        "event handler failed"
                    );
                }
                result
            }));
        }
        Dispatch { handles }
    }

    /// Stops accepting events.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.tracker.close();
    }

    /// Returns true once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of handler runs still in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Waits up to `grace` for every in-flight handler run, including runs
    /// started while waiting. Returns false on timeout.
    pub async fn wait_idle(&self, grace: Duration) -> bool {
        self.tracker.close();
        let finished = tokio::time::timeout(grace, self.tracker.wait())
            .await
            .is_ok();
        if !self.is_closed() {
            self.tracker.reopen();
        }
        if !finished {
            warn!(in_flight = self.in_flight(), "event handlers still running after grace period");
        }
        finished
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscription_count())
            .field("in_flight", &self.in_flight())
            .field("closed", &self.is_closed())
            .finish()
    }
}
