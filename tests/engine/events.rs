//! Integration tests for event dispatch to handler feature sets.

use std::time::Duration;

use aro_foundation::Value;

use crate::engine;

const GRACE: Duration = Duration::from_secs(5);

#[tokio::test]
async fn handlers_can_chain_events() {
    let (engine, console) = engine(
        r#"
        (Place Order: Orders) {
            <Create> the <order> with { id: 1, total: 30 }.
            <Emit> an <OrderPlaced: event> with <order>.
        }
        (Reserve Stock: OrderPlaced Handler) {
            <Extract> the <id> from the <event: id>.
            <Emit> a <StockReserved: event> with { order: <id> }.
        }
        (Notify: StockReserved Handler) {
            <Log> "reserved for order ${<event>.order}" to the <console>.
        }
        "#,
    );
    assert_eq!(engine.subscribe_handlers().len(), 2);
    engine.run_named("Place Order", Vec::new()).await.unwrap();
    assert!(engine.events().wait_idle(GRACE).await);
    assert_eq!(console.lines(), vec!["reserved for order 1"]);
}

#[tokio::test]
async fn state_guards_filter_payloads() {
    let (engine, console) = engine(
        r#"
        (Ship: OrderUpdated Handler<status:paid>) {
            <Log> "ship ${<event>.id}" to the <console>.
        }
        "#,
    );
    engine.subscribe_handlers();
    for (id, status) in [(1, "Paid"), (2, "pending"), (3, "PAID")] {
        let payload = Value::map([("id", Value::from(id)), ("status", Value::from(status))]);
        engine.publish_event("OrderUpdated", payload).wait().await;
    }
    assert_eq!(console.lines(), vec!["ship 1", "ship 3"]);
}

#[tokio::test]
async fn wildcard_handlers_see_every_event() {
    let (engine, console) = engine(
        r#"
        (Audit: Any Handler) { <Log> "seen" to the <console>. }
        (Only A: A Handler) { <Log> "a" to the <console>. }
        "#,
    );
    engine.subscribe_handlers();
    engine.publish_event("A", Value::Null).wait().await;
    engine.publish_event("B", Value::Null).wait().await;
    let mut lines = console.lines();
    lines.sort();
    assert_eq!(lines, vec!["a", "seen", "seen"]);
}

#[tokio::test]
async fn handler_failures_stay_with_the_handler() {
    let (engine, _) = engine(
        r#"
        (Emit It: Demo) { <Emit> a <Boom: event> with 1. }
        (Explode: Boom Handler) { <Throw> a <Broken: error> for the <event>. }
        "#,
    );
    engine.subscribe_handlers();
    engine.run_named("Emit It", Vec::new()).await.unwrap();

    let results = engine.publish_event("Boom", Value::Null).wait().await;
    assert_eq!(results.len(), 1);
    let err = results[0].as_ref().unwrap_err();
    assert_eq!(err.as_action().map(aro_foundation::ActionError::code), Some("user-thrown"));
}

#[tokio::test]
async fn closed_bus_drops_events() {
    let (engine, console) = engine(r#"(Log It: Ping Handler) { <Log> "ping" to the <console>. }"#);
    engine.subscribe_handlers();
    engine.events().close();
    let dispatch = engine.publish_event("Ping", Value::Null);
    assert!(dispatch.is_empty());
    assert!(engine.events().wait_idle(GRACE).await);
    assert!(console.lines().is_empty());
}
