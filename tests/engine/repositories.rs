//! Integration tests for repositories shared across feature-set runs.

use aro_foundation::Value;

use crate::engine;

const SOURCE: &str = r#"
(Seed: Users) {
    <Create> the <users> with [
        { id: 1, name: "Ada", team: "core" },
        { id: 2, name: "Grace", team: "core" },
        { id: 3, name: "Linus", team: "kernel" }
    ].
    <Store> the <users> into the <user-repository>.
}

(Core Team: Users) {
    <Retrieve> the <members: all> from the <user-repository> where team = "core".
    <Compute> the <count: length> from the <members>.
    <Return> the <count> for the <caller>.
}

(Find User: Users) {
    <Retrieve> the <user> from the <user-repository> where id = <user-id>.
    <Return> the <user: name> for the <caller>.
}

(Remove Kernel: Users) {
    <Retrieve> the <kernel: all> from the <user-repository> where team = "kernel".
    <Delete> the <kernel> from the <user-repository> where team = "kernel".
    <Retrieve> the <remaining> from the <user-repository>.
    <Compute> the <count: length> from the <remaining>.
    <Return> the <count> for the <caller>.
}
"#;

#[tokio::test]
async fn values_persist_between_runs() {
    let (engine, _) = engine(SOURCE);
    engine.run_named("Seed", Vec::new()).await.unwrap();

    let outcome = engine.run_named("Core Team", Vec::new()).await.unwrap();
    assert_eq!(outcome.response, Some(Value::Int(2)));

    let outcome = engine
        .run_named("Find User", vec![("user-id".to_string(), Value::Int(3))])
        .await
        .unwrap();
    assert_eq!(outcome.response, Some(Value::from("Linus")));
}

#[tokio::test]
async fn delete_removes_matching_entries() {
    let (engine, _) = engine(SOURCE);
    engine.run_named("Seed", Vec::new()).await.unwrap();
    let outcome = engine.run_named("Remove Kernel", Vec::new()).await.unwrap();
    assert_eq!(outcome.response, Some(Value::Int(2)));
    let remaining = engine.repositories().repository("user-repository").unwrap().all();
    assert_eq!(remaining.len(), 2);
}

#[tokio::test]
async fn missing_entries_name_the_query() {
    let (engine, _) = engine(SOURCE);
    let err = engine
        .run_named("Find User", vec![("user-id".to_string(), Value::Int(9))])
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Cannot retrieve the user from the user-repository where id = 9: \
         no user in user-repository has id = 9"
    );
}
