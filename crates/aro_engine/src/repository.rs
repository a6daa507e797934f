//! Named repositories of values.
//!
//! A repository is shared state reachable from every task; implementations
//! are responsible for their own synchronisation.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use aro_foundation::{ActionError, ActionResult, Value};

/// Suffix that marks a noun as a repository name.
pub const REPOSITORY_SUFFIX: &str = "-repository";

/// Field used to identify stored map values.
pub const ID_FIELD: &str = "id";

/// A named collection of values.
pub trait Repository: Send + Sync {
    /// The repository's name, e.g. `user-repository`.
    fn name(&self) -> &str;

    /// Stores a value. A map whose `id` equals a stored map's `id` replaces
    /// it; anything else is appended.
    fn store(&self, value: Value);

    /// Returns every stored value in insertion order.
    fn all(&self) -> Vec<Value>;

    /// Returns the values whose `field` loosely equals `value`.
    fn find(&self, field: &str, value: &Value) -> Vec<Value> {
        self.all()
            .into_iter()
            .filter(|item| item.get(field).is_some_and(|v| v.loosely_equals(value)))
            .collect()
    }

    /// Removes the values whose `field` loosely equals `value` and returns
    /// how many were removed.
    fn delete(&self, field: &str, value: &Value) -> usize;
}

/// Hands out repositories by name.
pub trait RepositoryStore: Send + Sync {
    /// Returns the repository called `name`.
    ///
    /// # Errors
    ///
    /// Returns `UndefinedRepository` if the name does not denote one.
    fn repository(&self, name: &str) -> ActionResult<Arc<dyn Repository>>;
}

// =============================================================================
// In-memory
// =============================================================================

/// A repository held in process memory.
pub struct InMemoryRepository {
    name: String,
    items: RwLock<Vec<Value>>,
}

impl InMemoryRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: RwLock::new(Vec::new()),
        }
    }

    /// Returns the number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for InMemoryRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryRepository")
            .field("name", &self.name)
            .field("len", &self.len())
            .finish()
    }
}

impl Repository for InMemoryRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn store(&self, value: Value) {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        let existing = value.get(ID_FIELD).and_then(|id| {
            items
                .iter()
                .position(|item| item.get(ID_FIELD).is_some_and(|v| v.loosely_equals(id)))
        });
        match existing {
            Some(index) => items[index] = value,
            None => items.push(value),
        }
    }

    fn all(&self) -> Vec<Value> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn delete(&self, field: &str, value: &Value) -> usize {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        let before = items.len();
        items.retain(|item| !item.get(field).is_some_and(|v| v.loosely_equals(value)));
        before - items.len()
    }
}

/// Creates any `*-repository` on first use and keeps it for the life of
/// the store.
#[derive(Default)]
pub struct InMemoryRepositoryStore {
    repositories: RwLock<HashMap<String, Arc<InMemoryRepository>>>,
}

impl InMemoryRepositoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the names of repositories created so far, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .repositories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl fmt::Debug for InMemoryRepositoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryRepositoryStore")
            .field("repositories", &self.names())
            .finish()
    }
}

impl RepositoryStore for InMemoryRepositoryStore {
    fn repository(&self, name: &str) -> ActionResult<Arc<dyn Repository>> {
        if !name.ends_with(REPOSITORY_SUFFIX) || name.len() == REPOSITORY_SUFFIX.len() {
            return Err(ActionError::undefined_repository(name));
        }
        if let Some(found) = self
            .repositories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(found.clone());
        }
        let mut repositories = self
            .repositories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let repository = repositories
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(InMemoryRepository::new(name)));
        Ok(repository.clone())
    }
}
