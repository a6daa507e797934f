//! Action contracts: the static role and preposition set each verb declares.
//!
//! The analyzer validates statements against these records and the engine's
//! dispatcher re-checks them at run time, so both sides read the same table.

use std::collections::HashMap;
use std::fmt;

use crate::token::Preposition;

/// What an action does with its result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionRole {
    /// Pulls data in from outside the feature set.
    Request,
    /// Computes a new value from data the feature set owns.
    Own,
    /// Produces output or a response; never binds.
    Response,
    /// Hands an existing value to an external store; never binds.
    Export,
    /// Controls long-running services.
    Server,
}

impl ActionRole {
    /// Returns the lowercase role name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Own => "own",
            Self::Response => "response",
            Self::Export => "export",
            Self::Server => "server",
        }
    }

    /// Returns true if actions of this role bind their result noun.
    #[must_use]
    pub const fn binds_result(self) -> bool {
        matches!(self, Self::Request | Self::Own | Self::Server)
    }

    /// Returns true if the result noun names an existing value the action
    /// consumes rather than a new binding.
    #[must_use]
    pub const fn consumes_result(self) -> bool {
        matches!(self, Self::Export)
    }
}

impl fmt::Display for ActionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static declaration of an action: role, verbs and accepted prepositions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActionContract {
    /// The action's role.
    pub role: ActionRole,
    /// Lowercase verbs that resolve to this action; the first is canonical.
    pub verbs: &'static [&'static str],
    /// Prepositions the object clause may use.
    pub prepositions: &'static [Preposition],
    /// Prepositions that make the object a label rather than a variable
    /// reference.
    pub label_prepositions: &'static [Preposition],
}

impl ActionContract {
    /// Creates a contract with no label prepositions.
    #[must_use]
    pub const fn new(
        role: ActionRole,
        verbs: &'static [&'static str],
        prepositions: &'static [Preposition],
    ) -> Self {
        Self {
            role,
            verbs,
            prepositions,
            label_prepositions: &[],
        }
    }

    /// Sets the label prepositions.
    #[must_use]
    pub const fn with_labels(mut self, labels: &'static [Preposition]) -> Self {
        self.label_prepositions = labels;
        self
    }

    /// Returns the canonical verb.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.verbs.first().copied().unwrap_or("")
    }

    /// Returns true if the object clause may use `preposition`.
    #[must_use]
    pub fn accepts(&self, preposition: Preposition) -> bool {
        self.prepositions.contains(&preposition)
    }

    /// Returns true if an object introduced by `preposition` is a label.
    #[must_use]
    pub fn is_label(&self, preposition: Preposition) -> bool {
        self.label_prepositions.contains(&preposition)
    }

    /// Returns the accepted prepositions as strings, for diagnostics.
    #[must_use]
    pub fn expected_prepositions(&self) -> Vec<String> {
        self.prepositions.iter().map(|p| p.as_str().to_string()).collect()
    }
}

/// Verb to contract lookup, implemented by anything that knows the actions
/// available to a program.
pub trait ContractLookup {
    /// Returns the contract for `verb`, matched case-insensitively.
    fn contract(&self, verb: &str) -> Option<&ActionContract>;
}

/// A plain verb-indexed table of contracts.
#[derive(Clone, Debug, Default)]
pub struct ContractTable {
    by_verb: HashMap<String, ActionContract>,
}

impl ContractTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a contract under each of its verbs. Later registrations replace
    /// earlier ones for the same verb.
    pub fn insert(&mut self, contract: ActionContract) {
        for verb in contract.verbs {
            self.by_verb.insert(verb.to_ascii_lowercase(), contract);
        }
    }

    /// Returns the number of registered verbs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_verb.len()
    }

    /// Returns true if no verbs are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_verb.is_empty()
    }
}

impl FromIterator<ActionContract> for ContractTable {
    fn from_iter<I: IntoIterator<Item = ActionContract>>(iter: I) -> Self {
        let mut table = Self::new();
        for contract in iter {
            table.insert(contract);
        }
        table
    }
}

impl ContractLookup for ContractTable {
    fn contract(&self, verb: &str) -> Option<&ActionContract> {
        self.by_verb.get(&verb.to_ascii_lowercase())
    }
}
