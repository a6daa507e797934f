//! Export actions: hand an existing value to a repository.

use aro_engine::repository::ID_FIELD;
use aro_engine::{ActionRegistry, ExecutionContext};
use aro_foundation::{ActionError, ActionResult, Value};
use aro_language::ast::{ObjectDescriptor, ResultDescriptor};
use aro_language::contract::{ActionContract, ActionRole};
use aro_language::token::Preposition::{From, Into, To};

use tracing::debug;

use crate::consumed;

/// `<Store> the <user> into the <user-repository>`
pub const STORE: ActionContract = ActionContract::new(
    ActionRole::Export,
    &["store", "save", "persist"],
    &[Into, To],
);

/// `<Delete> the <user> from the <user-repository> where id = <id>`
pub const DELETE: ActionContract =
    ActionContract::new(ActionRole::Export, &["delete", "remove"], &[From]);

/// Every export contract.
pub const CONTRACTS: &[ActionContract] = &[STORE, DELETE];

pub(crate) fn register(registry: &mut ActionRegistry) {
    registry.register_sync(STORE, store);
    registry.register_sync(DELETE, delete);
}

/// Stores the value, or each element of a list.
fn store(
    result: &ResultDescriptor,
    object: &ObjectDescriptor,
    ctx: &mut ExecutionContext,
) -> ActionResult<Value> {
    let value = consumed(result, ctx)?;
    let repository = ctx.repository(object.base())?;
    match &value {
        Value::List(items) => items.iter().cloned().for_each(|item| repository.store(item)),
        other => repository.store(other.clone()),
    }
    Ok(value)
}

/// Deletes by the `where` clause, or by the result's `id` field. Like every
/// export, nothing is bound; the number removed is only logged.
fn delete(
    result: &ResultDescriptor,
    object: &ObjectDescriptor,
    ctx: &mut ExecutionContext,
) -> ActionResult<Value> {
    let repository = ctx.repository(object.base())?;
    let (field, key) = match ctx.where_clause() {
        Some(clause) => clause,
        None => {
            let value = consumed(result, ctx)?;
            let id = value
                .get(ID_FIELD)
                .cloned()
                .ok_or_else(|| ActionError::property_not_found(ID_FIELD, result.base()))?;
            (ID_FIELD.to_string(), id)
        }
    };
    let removed = repository.delete(&field, &key);
    debug!(repository = object.base(), %field, %key, removed, "deleted values");
    Ok(Value::from(removed))
}

#[cfg(test)]
mod tests {
    use aro_foundation::ActionErrorKind;

    use super::*;
    use crate::testing::run;

    #[tokio::test]
    async fn store_upserts_by_id() {
        let (outcome, _) = run(r#"
            <Create> the <first> with { id: 1, name: "Ada" }.
            <Create> the <renamed> with { id: 1, name: "Grace" }.
            <Create> the <more> with [{ id: 2 }, { id: 3 }].
            <Store> the <first> into the <user-repository>.
            <Store> the <renamed> into the <user-repository>.
            <Store> the <more> into the <user-repository>.
            <Retrieve> the <users> from the <user-repository>.
            <Retrieve> the <user> from the <user-repository> where id = 1.
        "#)
        .await;
        let bindings = outcome.unwrap().bindings;
        assert_eq!(bindings.get("users").and_then(Value::len), Some(3));
        assert_eq!(
            bindings.get("user").and_then(|u| u.get("name")),
            Some(&Value::from("Grace"))
        );
    }

    #[tokio::test]
    async fn delete_by_where_clause_or_id() {
        let (outcome, _) = run(r#"
            <Create> the <users> with [{ id: 1, role: "a" }, { id: 2, role: "b" }, { id: 3, role: "b" }].
            <Store> the <users> into the <user-repository>.
            <Create> the <first> with { id: 1 }.
            <Delete> the <first> from the <user-repository>.
            <Delete> the <users> from the <user-repository> where role = "b".
            <Retrieve> the <rest> from the <user-repository>.
        "#)
        .await;
        let bindings = outcome.unwrap().bindings;
        assert_eq!(bindings.get("rest"), Some(&Value::list(Vec::<Value>::new())));
    }

    #[tokio::test]
    async fn delete_binds_nothing() {
        let (outcome, _) = run(r#"
            <Create> the <user> with { id: 7 }.
            <Store> the <user> into the <user-repository>.
            <Delete> the <user> from the <user-repository>.
        "#)
        .await;
        let bindings = outcome.unwrap().bindings;
        assert_eq!(bindings.get("user"), Some(&Value::map([("id", 7)])));
        assert_eq!(bindings.keys().filter(|k| !k.starts_with('_')).count(), 1);
    }

    #[tokio::test]
    async fn unknown_repositories_are_reported() {
        let (outcome, _) = run("
            <Create> the <x> with 1.
            <Store> the <x> into the <warehouse>.
        ")
        .await;
        let err = outcome.unwrap_err();
        assert_eq!(
            err.as_action().unwrap().kind,
            ActionErrorKind::UndefinedRepository("warehouse".to_string())
        );
    }
}
