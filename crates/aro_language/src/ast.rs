//! Abstract Syntax Tree for ARO programs.
//!
//! The AST is immutable after parsing. Statement bodies are shared slices so
//! the same tree can be walked by many concurrent executions.

use std::fmt;
use std::sync::Arc;

use crate::span::Span;
use crate::token::Preposition;

/// Binding name for a value written in a statement's result position.
pub const LITERAL_BINDING: &str = "_literal_";
/// Binding name for a statement's non-noun object expression.
pub const EXPRESSION_BINDING: &str = "_expression_";
/// Binding name for a statement's `with` clause value.
pub const WITH_BINDING: &str = "_with_";
/// Binding name for a statement's `where` clause value.
pub const WHERE_BINDING: &str = "_where_";

/// Name an invoked feature set's input is bound to.
pub const INPUT_BINDING: &str = "input";
/// Name the triggering event's payload is bound to in handler runs.
pub const EVENT_BINDING: &str = "event";
/// Name the failure message is bound to in `Application-End: Error`.
pub const ERROR_BINDING: &str = "error";

/// Name of the entry-point feature set.
pub const ENTRY_POINT: &str = "Application-Start";
/// Name shared by the exit-point feature sets.
pub const EXIT_POINT: &str = "Application-End";

/// A shared, immutable statement sequence.
pub type Block = Arc<[Statement]>;

/// A parsed source unit: an ordered list of feature sets.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Program {
    /// Feature sets in source order.
    pub feature_sets: Vec<FeatureSet>,
}

impl Program {
    /// Appends the feature sets of another program.
    pub fn extend(&mut self, other: Program) {
        self.feature_sets.extend(other.feature_sets);
    }

    /// Finds a feature set by name.
    #[must_use]
    pub fn feature_set(&self, name: &str) -> Option<&FeatureSet> {
        self.feature_sets.iter().find(|fs| fs.name == name)
    }

    /// Returns a copy with every span replaced by [`Span::none`], for
    /// structural comparison of trees parsed from different text.
    #[must_use]
    pub fn without_spans(&self) -> Program {
        let mut copy = self.clone();
        for fs in &mut copy.feature_sets {
            fs.erase_spans();
        }
        copy
    }
}

/// A named group of statements triggered as a unit.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureSet {
    /// Feature set name, e.g. `Application-Start` or `Create User`.
    pub name: String,
    /// Business activity that scopes published variables.
    pub business_activity: String,
    /// Field guards from a `<field:v1,v2;other:v>` header suffix.
    pub state_guards: Vec<StateGuard>,
    /// Statements in source order.
    pub statements: Block,
    /// Source location of the whole feature set.
    pub span: Span,
}

/// How a program exits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExitKind {
    /// `Application-End: Success`
    Success,
    /// `Application-End: Error`
    Error,
}

impl FeatureSet {
    /// Returns true if this is the application's entry point.
    #[must_use]
    pub fn is_entry_point(&self) -> bool {
        self.name == ENTRY_POINT
    }

    /// Returns the exit kind if this is an exit-point feature set.
    #[must_use]
    pub fn exit_kind(&self) -> Option<ExitKind> {
        if self.name != EXIT_POINT {
            return None;
        }
        match self.business_activity.as_str() {
            "Success" => Some(ExitKind::Success),
            "Error" => Some(ExitKind::Error),
            _ => None,
        }
    }

    /// Returns the event type this feature set handles, if its activity
    /// ends in `Handler`. `Any Handler` and `* Handler` subscribe to every
    /// event and yield `"*"`.
    #[must_use]
    pub fn handled_event(&self) -> Option<&str> {
        let event = self.business_activity.strip_suffix(" Handler")?.trim();
        match event {
            "" => None,
            "Any" | "*" => Some("*"),
            other => Some(other),
        }
    }

    /// Returns true if this feature set is a test case.
    #[must_use]
    pub fn is_test(&self) -> bool {
        self.business_activity == "Test" || self.business_activity.ends_with(" Test")
    }

    fn erase_spans(&mut self) {
        self.span = Span::none();
        for guard in &mut self.state_guards {
            guard.span = Span::none();
        }
        erase_block(&mut self.statements);
    }
}

/// A field condition on an event payload, e.g. `status:paid,shipped`.
///
/// The guard holds if the field equals any of the values, compared
/// case-insensitively.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateGuard {
    /// Dotted path into the payload.
    pub field_path: Vec<String>,
    /// Accepted values.
    pub values: Vec<String>,
    /// Source location.
    pub span: Span,
}

impl fmt::Display for StateGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field_path.join("."), self.values.join(","))
    }
}

/// A statement inside a feature set or block.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    /// `<Verb> the <result> prep the <object>.`
    Aro(AroStatement),
    /// `match <subject> { case ... }`
    Match(MatchExpression),
    /// `for each <item> in <collection> { ... }`
    ForEach(ForEachLoop),
    /// `parallel for each <item> in <collection> { ... }`
    ParallelForEach(ForEachLoop),
    /// `<Publish> as <external> <internal>.`
    Publish(PublishStatement),
}

impl Statement {
    /// Returns the source location of this statement.
    #[must_use]
    pub const fn span(&self) -> Span {
        match self {
            Self::Aro(s) => s.span,
            Self::Match(m) => m.span,
            Self::ForEach(l) | Self::ParallelForEach(l) => l.span,
            Self::Publish(p) => p.span,
        }
    }

    fn erase_spans(&mut self) {
        match self {
            Self::Aro(s) => s.erase_spans(),
            Self::Match(m) => {
                m.span = Span::none();
                m.subject.erase_spans();
                for case in &mut m.cases {
                    case.span = Span::none();
                    if let Pattern::Noun(noun) = &mut case.pattern {
                        noun.span = Span::none();
                    }
                    if let Some(guard) = &mut case.guard {
                        guard.erase_spans();
                    }
                    erase_block(&mut case.body);
                }
                if let Some(otherwise) = &mut m.otherwise {
                    erase_block(otherwise);
                }
            }
            Self::ForEach(l) | Self::ParallelForEach(l) => {
                l.span = Span::none();
                l.collection.erase_spans();
                if let Some(filter) = &mut l.filter {
                    filter.erase_spans();
                }
                erase_block(&mut l.body);
            }
            Self::Publish(p) => p.span = Span::none(),
        }
    }
}

fn erase_block(block: &mut Block) {
    let mut statements = block.to_vec();
    for statement in &mut statements {
        statement.erase_spans();
    }
    *block = statements.into();
}

/// The core Action-Result-Object statement.
#[derive(Clone, Debug, PartialEq)]
pub struct AroStatement {
    /// The action verb as written, e.g. `Extract`.
    pub verb: String,
    /// What the statement produces (or, for responses, refers to).
    pub result: ResultDescriptor,
    /// What the statement acts on.
    pub object: ObjectDescriptor,
    /// A value written in place of the result noun, e.g. `<Log> "hi" to ...`.
    pub literal: Option<Expr>,
    /// An object written as an expression rather than a single noun.
    pub expression: Option<Expr>,
    /// `with <expr>` clause.
    pub with: Option<Expr>,
    /// `where field = <expr>` clause.
    pub where_clause: Option<WhereClause>,
    /// `when <expr>` guard, leading or trailing.
    pub guard: Option<Expr>,
    /// Source location.
    pub span: Span,
}

impl AroStatement {
    /// Returns the verb lowercased, as used for registry lookup.
    #[must_use]
    pub fn verb_key(&self) -> String {
        self.verb.to_ascii_lowercase()
    }

    /// Renders the statement as an English phrase for error messages,
    /// e.g. "Cannot retrieve the user from the user-repository".
    #[must_use]
    pub fn failure_phrase(&self) -> String {
        format!(
            "Cannot {} the {} {} the {}",
            self.verb_key(),
            self.result.noun.base,
            self.object.preposition,
            self.object.noun.base
        )
    }

    fn erase_spans(&mut self) {
        self.span = Span::none();
        self.result.noun.span = Span::none();
        self.object.noun.span = Span::none();
        for expr in [
            &mut self.literal,
            &mut self.expression,
            &mut self.with,
            &mut self.guard,
        ]
        .into_iter()
        .flatten()
        {
            expr.erase_spans();
        }
        if let Some(clause) = &mut self.where_clause {
            clause.span = Span::none();
            clause.value.erase_spans();
        }
    }
}

/// A base identifier plus ordered specifiers, e.g. `user: name email`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QualifiedNoun {
    /// The base identifier; becomes the bound variable name.
    pub base: String,
    /// Specifiers in source order; dotted specifiers keep their dots.
    pub specifiers: Vec<String>,
    /// Source location including the angle brackets.
    pub span: Span,
}

impl QualifiedNoun {
    /// Creates a noun.
    #[must_use]
    pub fn new(base: impl Into<String>, specifiers: Vec<String>, span: Span) -> Self {
        Self {
            base: base.into(),
            specifiers,
            span,
        }
    }

    /// Returns true if the base carries the reserved framework prefix `_`.
    #[must_use]
    pub fn is_framework(&self) -> bool {
        self.base.starts_with('_')
    }

    /// Returns the specifiers split into individual path steps.
    #[must_use]
    pub fn key_path(&self) -> Vec<&str> {
        self.specifiers
            .iter()
            .flat_map(|s| s.split('.'))
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl fmt::Display for QualifiedNoun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.base)?;
        if !self.specifiers.is_empty() {
            write!(f, ": {}", self.specifiers.join(" "))?;
        }
        write!(f, ">")
    }
}

/// Structured view of a statement's result clause.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultDescriptor {
    /// The result noun.
    pub noun: QualifiedNoun,
}

impl ResultDescriptor {
    /// Creates a result descriptor.
    #[must_use]
    pub const fn new(noun: QualifiedNoun) -> Self {
        Self { noun }
    }

    /// The name the result is bound to.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.noun.base
    }

    /// The result's specifiers, which select an operation or refine meaning.
    #[must_use]
    pub fn specifiers(&self) -> &[String] {
        &self.noun.specifiers
    }

    /// Returns true if any specifier equals `name` (case-insensitive).
    #[must_use]
    pub fn has_specifier(&self, name: &str) -> bool {
        self.noun
            .specifiers
            .iter()
            .any(|s| s.eq_ignore_ascii_case(name))
    }
}

/// Structured view of a statement's object clause.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectDescriptor {
    /// The connecting preposition.
    pub preposition: Preposition,
    /// The object noun.
    pub noun: QualifiedNoun,
}

impl ObjectDescriptor {
    /// Creates an object descriptor.
    #[must_use]
    pub const fn new(preposition: Preposition, noun: QualifiedNoun) -> Self {
        Self { preposition, noun }
    }

    /// The object's base name.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.noun.base
    }

    /// The dotted key path used to navigate into the object's value.
    #[must_use]
    pub fn key_path(&self) -> Vec<&str> {
        self.noun.key_path()
    }

    /// Returns true if the object is a statement-local expression rather
    /// than a named binding.
    #[must_use]
    pub fn is_expression(&self) -> bool {
        self.noun.base == EXPRESSION_BINDING
    }
}

/// `where field = value` on a statement.
#[derive(Clone, Debug, PartialEq)]
pub struct WhereClause {
    /// The field name being matched.
    pub field: String,
    /// The value it must equal.
    pub value: Expr,
    /// Source location.
    pub span: Span,
}

/// `match` with ordered cases.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchExpression {
    /// The value being matched.
    pub subject: Expr,
    /// Cases in declaration order.
    pub cases: Vec<MatchCase>,
    /// Body run when no case matches.
    pub otherwise: Option<Block>,
    /// Source location.
    pub span: Span,
}

/// One `case` of a match.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchCase {
    /// The pattern compared with the subject.
    pub pattern: Pattern,
    /// Optional `where` guard.
    pub guard: Option<Expr>,
    /// Statements run when selected.
    pub body: Block,
    /// Source location.
    pub span: Span,
}

/// A match pattern.
#[derive(Clone, Debug, PartialEq)]
pub enum Pattern {
    /// A literal value.
    Literal(Literal),
    /// The value of a bound variable.
    Noun(QualifiedNoun),
    /// `_`, matching anything.
    Wildcard,
}

/// `for each` and `parallel for each`.
#[derive(Clone, Debug, PartialEq)]
pub struct ForEachLoop {
    /// Name bound to each element.
    pub item: String,
    /// Optional name bound to each element's index.
    pub index: Option<String>,
    /// The collection iterated.
    pub collection: Expr,
    /// Optional per-element `where` filter.
    pub filter: Option<Expr>,
    /// Maximum concurrent iterations (parallel loops only).
    pub concurrency: Option<usize>,
    /// The loop body.
    pub body: Block,
    /// Source location.
    pub span: Span,
}

/// `<Publish> as <external> <internal>.`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishStatement {
    /// Name visible to other feature sets of the same business activity.
    pub external_name: String,
    /// The already-bound local name.
    pub internal_name: String,
    /// Source location.
    pub span: Span,
}

// =============================================================================
// Expressions
// =============================================================================

/// A literal value.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    /// String literal without interpolation.
    String(String),
    /// Integer literal.
    Integer(i64),
    /// Float literal.
    Float(f64),
    /// Boolean literal.
    Boolean(bool),
    /// `null`
    Null,
}

/// Part of an interpolated string.
#[derive(Clone, Debug, PartialEq)]
pub enum StringPart {
    /// Literal text.
    Text(String),
    /// A `${...}` expression.
    Expr(Expr),
}

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-`
    Neg,
    /// `not`
    Not,
}

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `++`
    Concat,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==` or `is`
    Eq,
    /// `!=` or `is not`
    Ne,
    /// `and`
    And,
    /// `or`
    Or,
}

impl BinaryOp {
    /// Binding strength, from 1 (`or`) to 6 (`* / %`).
    #[must_use]
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq | Self::Ne => 3,
            Self::Lt | Self::Le | Self::Gt | Self::Ge => 4,
            Self::Add | Self::Sub | Self::Concat => 5,
            Self::Mul | Self::Div | Self::Rem => 6,
        }
    }

    /// Canonical spelling.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Concat => "++",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// An expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Literal value.
    Literal(Literal, Span),
    /// String with `${...}` parts.
    Interpolated(Vec<StringPart>, Span),
    /// Reference to a bound variable, e.g. `<user: name>`.
    Noun(QualifiedNoun),
    /// `[a, b, c]`
    List(Vec<Expr>, Span),
    /// `{ key: value, ... }`
    Map(Vec<(String, Expr)>, Span),
    /// Prefix operator.
    Unary(UnaryOp, Box<Expr>, Span),
    /// Infix operator.
    Binary(BinaryOp, Box<Expr>, Box<Expr>, Span),
    /// `expr.field`
    Member(Box<Expr>, String, Span),
    /// `expr[index]`
    Index(Box<Expr>, Box<Expr>, Span),
}

impl Expr {
    /// Returns the source location of this expression.
    #[must_use]
    pub const fn span(&self) -> Span {
        match self {
            Self::Noun(noun) => noun.span,
            Self::Literal(_, span)
            | Self::Interpolated(_, span)
            | Self::List(_, span)
            | Self::Map(_, span)
            | Self::Unary(_, _, span)
            | Self::Binary(_, _, _, span)
            | Self::Member(_, _, span)
            | Self::Index(_, _, span) => *span,
        }
    }

    /// Calls `visit` for every noun referenced by this expression,
    /// including those inside interpolations.
    pub fn for_each_noun<'a>(&'a self, visit: &mut impl FnMut(&'a QualifiedNoun)) {
        match self {
            Self::Noun(noun) => visit(noun),
            Self::Literal(..) => {}
            Self::Interpolated(parts, _) => {
                for part in parts {
                    if let StringPart::Expr(expr) = part {
                        expr.for_each_noun(visit);
                    }
                }
            }
            Self::List(items, _) => {
                for item in items {
                    item.for_each_noun(visit);
                }
            }
            Self::Map(entries, _) => {
                for (_, value) in entries {
                    value.for_each_noun(visit);
                }
            }
            Self::Unary(_, operand, _) | Self::Member(operand, _, _) => {
                operand.for_each_noun(visit);
            }
            Self::Binary(_, lhs, rhs, _) | Self::Index(lhs, rhs, _) => {
                lhs.for_each_noun(visit);
                rhs.for_each_noun(visit);
            }
        }
    }

    fn erase_spans(&mut self) {
        match self {
            Self::Noun(noun) => noun.span = Span::none(),
            Self::Literal(_, span) => *span = Span::none(),
            Self::Interpolated(parts, span) => {
                *span = Span::none();
                for part in parts {
                    if let StringPart::Expr(expr) = part {
                        expr.erase_spans();
                    }
                }
            }
            Self::List(items, span) => {
                *span = Span::none();
                items.iter_mut().for_each(Self::erase_spans);
            }
            Self::Map(entries, span) => {
                *span = Span::none();
                for (_, value) in entries {
                    value.erase_spans();
                }
            }
            Self::Unary(_, operand, span) | Self::Member(operand, _, span) => {
                *span = Span::none();
                operand.erase_spans();
            }
            Self::Binary(_, lhs, rhs, span) | Self::Index(lhs, rhs, span) => {
                *span = Span::none();
                lhs.erase_spans();
                rhs.erase_spans();
            }
        }
    }
}

#[cfg(test)]
impl Expr {
    /// Creates an integer literal with a default span.
    pub fn int(n: i64) -> Self {
        Self::Literal(Literal::Integer(n), Span::default())
    }

    /// Creates a string literal with a default span.
    pub fn string(s: &str) -> Self {
        Self::Literal(Literal::String(s.to_string()), Span::default())
    }

    /// Creates a bare noun reference with a default span.
    pub fn noun(name: &str) -> Self {
        Self::Noun(QualifiedNoun::new(name, Vec::new(), Span::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature_set(name: &str, activity: &str) -> FeatureSet {
        FeatureSet {
            name: name.to_string(),
            business_activity: activity.to_string(),
            state_guards: Vec::new(),
            statements: Arc::from(Vec::new()),
            span: Span::default(),
        }
    }

    #[test]
    fn feature_set_roles() {
        assert!(feature_set("Application-Start", "Demo").is_entry_point());
        assert_eq!(
            feature_set("Application-End", "Success").exit_kind(),
            Some(ExitKind::Success)
        );
        assert_eq!(feature_set("Application-End", "Other").exit_kind(), None);
        assert_eq!(
            feature_set("Send Welcome", "UserCreated Handler").handled_event(),
            Some("UserCreated")
        );
        assert_eq!(
            feature_set("Audit", "Any Handler").handled_event(),
            Some("*")
        );
        assert_eq!(feature_set("List Users", "User API").handled_event(), None);
        assert!(feature_set("adds numbers", "Calculator Test").is_test());
    }

    #[test]
    fn noun_key_path_splits_dots() {
        let noun = QualifiedNoun::new(
            "request",
            vec!["body.user".to_string(), "name".to_string()],
            Span::default(),
        );
        assert_eq!(noun.key_path(), vec!["body", "user", "name"]);
        assert_eq!(noun.to_string(), "<request: body.user name>");
    }

    #[test]
    fn for_each_noun_visits_nested_references() {
        let expr = Expr::Binary(
            BinaryOp::Add,
            Box::new(Expr::noun("a")),
            Box::new(Expr::List(vec![Expr::int(1), Expr::noun("b")], Span::default())),
            Span::default(),
        );
        let mut names = Vec::new();
        expr.for_each_noun(&mut |noun| names.push(noun.base.clone()));
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn precedence_ordering() {
        assert!(BinaryOp::Mul.precedence() > BinaryOp::Add.precedence());
        assert!(BinaryOp::Add.precedence() > BinaryOp::Lt.precedence());
        assert!(BinaryOp::Lt.precedence() > BinaryOp::Eq.precedence());
        assert!(BinaryOp::And.precedence() > BinaryOp::Or.precedence());
    }
}
