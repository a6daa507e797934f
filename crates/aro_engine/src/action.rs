//! The action registry and statement dispatch.
//!
//! An action is a contract plus a plain function. The registry is built
//! once before the engine starts and is read-only afterwards, so dispatch
//! takes no locks.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use aro_foundation::{ActionError, ActionResult, Value};
use aro_language::ast::{AroStatement, ObjectDescriptor, ResultDescriptor};
use aro_language::contract::{ActionContract, ContractLookup};
use tracing::debug;

use crate::BoxFuture;
use crate::context::ExecutionContext;
use crate::error::{ExecutionError, Result};

/// An action that completes without suspending.
pub type SyncAction =
    fn(&ResultDescriptor, &ObjectDescriptor, &mut ExecutionContext) -> ActionResult<Value>;

/// An action that awaits I/O through a service.
pub type AsyncAction = for<'a> fn(
    &'a ResultDescriptor,
    &'a ObjectDescriptor,
    &'a mut ExecutionContext,
) -> BoxFuture<'a, ActionResult<Value>>;

/// How an action runs.
#[derive(Clone, Copy)]
pub enum Behavior {
    /// Runs to completion on the calling task.
    Sync(SyncAction),
    /// Returns a future the dispatcher awaits.
    Async(AsyncAction),
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Sync"),
            Self::Async(_) => f.write_str("Async"),
        }
    }
}

/// A registered action.
#[derive(Clone, Debug)]
pub struct ActionEntry {
    /// Declared role and prepositions.
    pub contract: ActionContract,
    /// The executable behavior.
    pub behavior: Behavior,
}

impl ActionEntry {
    /// Runs the behavior.
    pub async fn execute(
        &self,
        result: &ResultDescriptor,
        object: &ObjectDescriptor,
        ctx: &mut ExecutionContext,
    ) -> ActionResult<Value> {
        match self.behavior {
            Behavior::Sync(action) => action(result, object, ctx),
            Behavior::Async(action) => action(result, object, ctx).await,
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Lowercase verb to action.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    by_verb: HashMap<String, Arc<ActionEntry>>,
}

impl ActionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an action under every verb its contract lists, replacing
    /// earlier registrations of those verbs.
    pub fn register(&mut self, contract: ActionContract, behavior: Behavior) {
        let entry = Arc::new(ActionEntry { contract, behavior });
        for verb in contract.verbs {
            self.by_verb.insert(verb.to_ascii_lowercase(), entry.clone());
        }
    }

    /// Registers a synchronous action.
    pub fn register_sync(&mut self, contract: ActionContract, action: SyncAction) {
        self.register(contract, Behavior::Sync(action));
    }

    /// Registers an asynchronous action.
    pub fn register_async(&mut self, contract: ActionContract, action: AsyncAction) {
        self.register(contract, Behavior::Async(action));
    }

    /// Looks up a verb, case-insensitively.
    #[must_use]
    pub fn get(&self, verb: &str) -> Option<&ActionEntry> {
        self.by_verb
            .get(&verb.to_ascii_lowercase())
            .map(Arc::as_ref)
    }

    /// Returns every registered verb, sorted.
    #[must_use]
    pub fn verbs(&self) -> Vec<&str> {
        let mut verbs: Vec<&str> = self.by_verb.keys().map(String::as_str).collect();
        verbs.sort_unstable();
        verbs
    }

    /// Returns the number of registered verbs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_verb.len()
    }

    /// Returns true if no verb is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_verb.is_empty()
    }

    /// Runs one statement: resolves its verb, rechecks its preposition,
    /// runs the action and binds the result if the role produces one.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAction`, `InvalidPreposition` or the action's own
    /// error. A rebind of the result is an invariant failure.
    pub async fn dispatch(
        &self,
        statement: &AroStatement,
        ctx: &mut ExecutionContext,
    ) -> Result<Value> {
        let verb = statement.verb_key();
        let entry = self
            .get(&verb)
            .ok_or_else(|| ActionError::unknown_action(&statement.verb))?;
        let contract = entry.contract;
        let preposition = statement.object.preposition;
        if !contract.accepts(preposition) {
            return Err(ActionError::invalid_preposition(
                verb,
                preposition.as_str(),
                contract.expected_prepositions(),
            )
            .into());
        }

        debug!(
            verb = %statement.verb,
            role = %contract.role,
            result = %statement.result.noun,
            object = %statement.object.noun,
            line = statement.span.line,
            "dispatching statement"
        );

        let value = entry
            .execute(&statement.result, &statement.object, ctx)
            .await?;

        if contract.role.binds_result() && statement.literal.is_none() {
            ctx.bind(statement.result.base(), value.clone())
                .map_err(ExecutionError::from)?;
        }
        Ok(value)
    }
}

impl ContractLookup for ActionRegistry {
    fn contract(&self, verb: &str) -> Option<&ActionContract> {
        self.get(verb).map(|entry| &entry.contract)
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("verbs", &self.verbs())
            .finish()
    }
}
