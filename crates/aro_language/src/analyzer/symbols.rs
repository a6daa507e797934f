//! Symbol tables for one feature set.

use std::collections::BTreeMap;

use crate::span::Span;

/// Where a name is visible.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Bound in the defining feature set only.
    Internal,
    /// Exported to feature sets sharing the business activity.
    Published,
    /// Provided by the hosting runtime.
    External,
}

/// A bound name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    /// The bound name.
    pub name: String,
    /// Its visibility.
    pub visibility: Visibility,
    /// Where it was bound.
    pub span: Span,
}

/// Nested scopes of bound names for a single feature set.
///
/// The outermost scope belongs to the feature set. Loop bodies and match
/// case bodies push a scope that is discarded when they end.
#[derive(Clone, Debug)]
pub struct SymbolTable {
    feature_set: String,
    business_activity: String,
    scopes: Vec<BTreeMap<String, Symbol>>,
}

impl SymbolTable {
    /// Creates a table with an empty feature-set scope.
    #[must_use]
    pub fn new(feature_set: impl Into<String>, business_activity: impl Into<String>) -> Self {
        Self {
            feature_set: feature_set.into(),
            business_activity: business_activity.into(),
            scopes: vec![BTreeMap::new()],
        }
    }

    /// The feature set this table belongs to.
    #[must_use]
    pub fn feature_set(&self) -> &str {
        &self.feature_set
    }

    /// The feature set's business activity.
    #[must_use]
    pub fn business_activity(&self) -> &str {
        &self.business_activity
    }

    /// Enters a nested scope.
    pub fn push_scope(&mut self) {
        self.scopes.push(BTreeMap::new());
    }

    /// Leaves the innermost nested scope. The feature-set scope is never
    /// popped.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Returns the current nesting depth, 0 for the feature-set scope.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    /// Looks a name up through every enclosing scope.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Binds a name in the innermost scope.
    ///
    /// # Errors
    ///
    /// Returns the span of the existing binding if the name is already
    /// visible, since children inherit their parents' bindings.
    pub fn define(&mut self, name: &str, visibility: Visibility, span: Span) -> Result<(), Span> {
        if let Some(existing) = self.lookup(name) {
            return Err(existing.span);
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(
                name.to_string(),
                Symbol {
                    name: name.to_string(),
                    visibility,
                    span,
                },
            );
        }
        Ok(())
    }

    /// Returns the feature-set scope's symbols in name order.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.scopes[0].values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_scopes_shadow_nothing() {
        let mut table = SymbolTable::new("Orders", "Order API");
        table.define("order", Visibility::Internal, Span::none()).unwrap();
        table.push_scope();
        assert!(table.define("order", Visibility::Internal, Span::none()).is_err());
        table.define("item", Visibility::Internal, Span::none()).unwrap();
        assert!(table.lookup("order").is_some());
        table.pop_scope();
        assert!(table.lookup("item").is_none());
        assert_eq!(table.depth(), 0);
    }

    #[test]
    fn root_scope_is_never_popped() {
        let mut table = SymbolTable::new("A", "B");
        table.define("x", Visibility::Published, Span::none()).unwrap();
        table.pop_scope();
        let names: Vec<&str> = table.symbols().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["x"]);
    }
}
