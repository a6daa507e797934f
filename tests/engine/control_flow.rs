//! Integration tests for guards, match and loops.

use aro_foundation::Value;

use crate::engine;

// =============================================================================
// Guards and match
// =============================================================================

#[tokio::test]
async fn guards_select_statements() {
    let (engine, console) = engine(
        r#"(Classify: Demo) {
            <Create> the <amount> with 250.
            when <amount> > 100 <Log> "large" to the <console>.
            <Log> "small" to the <console> when <amount> <= 100.
            when <amount> >= 250 and <amount> < 1000 <Log> "bounded" to the <console>.
        }"#,
    );
    engine.run_named("Classify", Vec::new()).await.unwrap();
    assert_eq!(console.lines(), vec!["large", "bounded"]);
}

#[tokio::test]
async fn match_on_request_data() {
    let source = r#"(Route: Demo) {
        match <method> {
            case "GET" { <Log> "read" to the <console>. }
            case <write-method> { <Log> "write" to the <console>. }
            otherwise { <Log> "other" to the <console>. }
        }
    }"#;
    for (method, expected) in [("GET", "read"), ("POST", "write"), ("PATCH", "other")] {
        let (engine, console) = engine(source);
        engine
            .run_named(
                "Route",
                vec![
                    ("method".to_string(), Value::from(method)),
                    ("write-method".to_string(), Value::from("POST")),
                ],
            )
            .await
            .unwrap();
        assert_eq!(console.lines(), vec![expected], "{method}");
    }
}

// =============================================================================
// Loops
// =============================================================================

#[tokio::test]
async fn for_each_over_a_map_yields_entries() {
    let (engine, console) = engine(
        r#"(Prices: Demo) {
            <Create> the <prices> with { apple: 3, pear: 5 }.
            for each <entry> in <prices> {
                <Log> "${<entry>.key}=${<entry>.value}" to the <console>.
            }
        }"#,
    );
    engine.run_named("Prices", Vec::new()).await.unwrap();
    assert_eq!(console.lines(), vec!["apple=3", "pear=5"]);
}

#[tokio::test]
async fn filtered_loop_with_index() {
    let (engine, console) = engine(
        r#"(Evens: Demo) {
            for each <n> at <i> in [1, 2, 3, 4] where <n> % 2 == 0 {
                <Log> "${<i>}:${<n>}" to the <console>.
            }
        }"#,
    );
    engine.run_named("Evens", Vec::new()).await.unwrap();
    assert_eq!(console.lines(), vec!["1:2", "3:4"]);
}

#[tokio::test]
async fn return_inside_a_loop_ends_the_run() {
    let (engine, console) = engine(
        r#"(Find: Demo) {
            for each <n> in [4, 8, 15, 16] {
                when <n> > 10 <Return> the <n> for the <caller>.
                <Log> "${<n>}" to the <console>.
            }
            <Log> "not reached" to the <console>.
        }"#,
    );
    let outcome = engine.run_named("Find", Vec::new()).await.unwrap();
    assert_eq!(outcome.response, Some(Value::Int(15)));
    assert_eq!(console.lines(), vec!["4", "8"]);
}

#[tokio::test]
async fn parallel_loop_visits_every_item() {
    let (engine, console) = engine(
        r#"(Fan Out: Demo) {
            parallel for each <n> in [1, 2, 3, 4, 5] with <concurrency: 2> {
                <Compute> the <square> from <n> * <n>.
                <Log> the <square> to the <console>.
            }
        }"#,
    );
    engine.run_named("Fan Out", Vec::new()).await.unwrap();
    let mut lines = console.lines();
    lines.sort();
    assert_eq!(lines, vec!["1", "16", "25", "4", "9"]);
}
