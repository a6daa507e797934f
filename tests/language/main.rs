//! Integration tests for Layer 2: Language
//!
//! Tests for the lexer, parser, pretty printer and semantic analyzer.

mod analyzer;
mod lexer;
mod parser;

/// A small but complete application used across the language tests.
pub const USER_SERVICE: &str = r#"
(* User service *)
(Application-Start: User Service) {
    <Create> the <config> with { port: 8080, name: "users" }.
    <Publish> as <app-config> <config>.
    <Start> the <http-server> with <config>.
    <Keepalive> the <application> for the <events>.
}

(createUser: User API) {
    <Extract> the <data> from the <request: body>.
    <Validate> the <checked: required> from the <data>.
    <Create> the <user> with <checked>.
    <Store> the <user> into the <user-repository>.
    <Emit> a <UserCreated: event> with <user>.
    <Return> a <Created: status> for the <request> with <user>.
}

(Send Welcome: UserCreated Handler) {
    <Extract> the <email> from the <event: email>.
    when <email> != null <Send> the <email> to the <mail-service>.
}

(Application-End: Success) {
    <Log> "Goodbye" to the <console>.
}
"#;
