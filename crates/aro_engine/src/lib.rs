//! Execution core for ARO.
//!
//! This crate provides:
//! - [`ExecutionContext`] - Binding scopes with service, repository and event access
//! - [`ActionRegistry`] - Verb lookup and statement dispatch
//! - [`Engine`] - The interpreter that runs feature sets
//! - [`EventBus`] - Publish/subscribe routing between feature sets
//! - [`services`] - Capability traits for all external I/O

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

use std::future::Future;
use std::pin::Pin;

pub mod action;
pub mod context;
pub mod error;
pub mod eval;
pub mod event;
pub mod interpreter;
pub mod repository;
pub mod services;

pub use action::{ActionEntry, ActionRegistry, AsyncAction, Behavior, SyncAction};
pub use context::{ContextMeta, ExecutionContext, PublishedStore};
pub use error::{ExecutionError, RebindError, Result};
pub use eval::evaluate;
pub use event::{Dispatch, Event, EventBus, EventHandler, Subscription, SubscriptionId, WILDCARD};
pub use interpreter::{Engine, EngineBuilder, RunOutcome};
pub use repository::{InMemoryRepositoryStore, Repository, RepositoryStore};
pub use services::ServiceRegistry;

/// A boxed, sendable future, as returned by asynchronous actions and
/// services.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
