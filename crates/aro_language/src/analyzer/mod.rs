//! Semantic analysis.
//!
//! One pass per feature set, in statement order, checking:
//!
//! - results are not rebinding a visible name or one the runtime binds
//!   before the feature set starts (immutability)
//! - every referenced noun is bound, published to the business activity,
//!   or provided by the runtime
//! - each statement's preposition is one its action accepts
//!
//! plus program-wide entry and exit point rules. Analysis never mutates the
//! tree; every finding is collected into an [`Analysis`].

mod diagnostic;
mod symbols;


use std::collections::{HashMap, HashSet};

pub use diagnostic::{Diagnostic, DiagnosticKind, Severity};
pub use symbols::{Symbol, SymbolTable, Visibility};

use crate::ast::{
    AroStatement, Block, ERROR_BINDING, EVENT_BINDING, ExitKind, Expr, FeatureSet, ForEachLoop,
    INPUT_BINDING, MatchExpression, Pattern, Program, PublishStatement, Statement,
};
use crate::contract::ContractLookup;
use crate::span::Span;

/// Names the runtime provides to every feature set by default.
pub const DEFAULT_EXTERNALS: &[&str] = &[
    "request",
    "event",
    "console",
    "application",
    "environment",
    "headers",
    "body",
    "pathParameters",
    "queryParameters",
    "error",
    "shutdown",
    "input",
];

/// Suffix marking a name as a runtime-provided repository.
pub const REPOSITORY_SUFFIX: &str = "-repository";

/// Analyzer settings.
#[derive(Clone, Debug)]
pub struct AnalyzerConfig {
    /// Names provided by the hosting runtime.
    pub externals: HashSet<String>,
    /// Whether a program must contain exactly one `Application-Start`.
    pub require_entry_point: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            externals: DEFAULT_EXTERNALS.iter().map(ToString::to_string).collect(),
            require_entry_point: true,
        }
    }
}

impl AnalyzerConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an externally provided name.
    #[must_use]
    pub fn with_external(mut self, name: impl Into<String>) -> Self {
        self.externals.insert(name.into());
        self
    }

    /// Sets whether the entry-point rule applies.
    #[must_use]
    pub fn with_require_entry_point(mut self, required: bool) -> Self {
        self.require_entry_point = required;
        self
    }
}

/// Result of analyzing a program.
#[derive(Clone, Debug, Default)]
pub struct Analysis {
    /// Every finding, in discovery order.
    pub diagnostics: Vec<Diagnostic>,
    /// The final feature-set scope of each analyzed feature set.
    pub symbols: Vec<SymbolTable>,
}

impl Analysis {
    /// Returns true if any error-severity diagnostic was found.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Returns the error-severity diagnostics.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    /// Returns the warning-severity diagnostics.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    /// Returns the symbol table for the named feature set.
    #[must_use]
    pub fn symbols_for(&self, feature_set: &str) -> Option<&SymbolTable> {
        self.symbols.iter().find(|t| t.feature_set() == feature_set)
    }
}

/// Analyzes a whole program against the given action contracts.
#[must_use]
pub fn analyze(
    program: &Program,
    contracts: &dyn ContractLookup,
    config: &AnalyzerConfig,
) -> Analysis {
    Analyzer::new(contracts, config).run(program)
}

/// Semantic analyzer state.
struct Analyzer<'a> {
    contracts: &'a dyn ContractLookup,
    config: &'a AnalyzerConfig,
    /// Published names per business activity.
    published: HashMap<String, HashSet<String>>,
    diagnostics: Vec<Diagnostic>,
}

/// Per-feature-set walk state.
struct Scope {
    table: SymbolTable,
    name: String,
    /// Names bound by the runtime before the first statement runs.
    preset: Vec<&'static str>,
}

impl Scope {
    fn is_preset(&self, name: &str) -> bool {
        self.preset.iter().any(|preset| *preset == name)
    }
}

impl<'a> Analyzer<'a> {
    fn new(contracts: &'a dyn ContractLookup, config: &'a AnalyzerConfig) -> Self {
        Self {
            contracts,
            config,
            published: HashMap::new(),
            diagnostics: Vec::new(),
        }
    }

    fn run(mut self, program: &Program) -> Analysis {
        for feature_set in &program.feature_sets {
            let mut names = HashSet::new();
            collect_published(&feature_set.statements, &mut names);
            self.published
                .entry(feature_set.business_activity.clone())
                .or_default()
                .extend(names);
        }

        self.check_program_shape(program);

        let symbols = program
            .feature_sets
            .iter()
            .map(|fs| self.analyze_feature_set(fs))
            .collect();

        Analysis {
            diagnostics: self.diagnostics,
            symbols,
        }
    }

    // =========================================================================
    // Program-wide rules
    // =========================================================================

    fn check_program_shape(&mut self, program: &Program) {
        let mut seen = HashSet::new();
        for fs in &program.feature_sets {
            if !seen.insert((fs.name.as_str(), fs.business_activity.as_str())) {
                self.push(
                    Diagnostic::error(
                        DiagnosticKind::DuplicateFeatureSet {
                            name: fs.name.clone(),
                            activity: fs.business_activity.clone(),
                        },
                        fs.span,
                    )
                    .in_feature_set(&fs.name),
                );
            }
        }

        let entries: Vec<&FeatureSet> = program
            .feature_sets
            .iter()
            .filter(|fs| fs.is_entry_point())
            .collect();
        if entries.is_empty() && self.config.require_entry_point {
            self.push(Diagnostic::error(DiagnosticKind::MissingEntryPoint, Span::none()));
        }
        for extra in entries.iter().skip(1) {
            self.push(
                Diagnostic::error(DiagnosticKind::DuplicateEntryPoint, extra.span)
                    .in_feature_set(&extra.name),
            );
        }

        for (kind, activity) in [(ExitKind::Success, "Success"), (ExitKind::Error, "Error")] {
            let exits = program
                .feature_sets
                .iter()
                .filter(|fs| fs.exit_kind() == Some(kind));
            for extra in exits.skip(1) {
                self.push(
                    Diagnostic::error(
                        DiagnosticKind::DuplicateExitPoint {
                            activity: activity.to_string(),
                        },
                        extra.span,
                    )
                    .in_feature_set(&extra.name),
                );
            }
        }
    }

    // =========================================================================
    // Feature sets and statements
    // =========================================================================

    fn analyze_feature_set(&mut self, fs: &FeatureSet) -> SymbolTable {
        let mut preset = vec![INPUT_BINDING];
        if fs.handled_event().is_some() {
            preset.push(EVENT_BINDING);
        }
        if fs.exit_kind() == Some(ExitKind::Error) {
            preset.push(ERROR_BINDING);
        }
        let mut scope = Scope {
            table: SymbolTable::new(&fs.name, &fs.business_activity),
            name: fs.name.clone(),
            preset,
        };
        self.analyze_block(&fs.statements, &mut scope);
        scope.table
    }

    fn analyze_block(&mut self, block: &Block, scope: &mut Scope) {
        for statement in block.iter() {
            self.analyze_statement(statement, scope);
        }
    }

    fn analyze_nested(&mut self, block: &Block, scope: &mut Scope) {
        scope.table.push_scope();
        self.analyze_block(block, scope);
        scope.table.pop_scope();
    }

    fn analyze_statement(&mut self, statement: &Statement, scope: &mut Scope) {
        match statement {
            Statement::Aro(s) => self.analyze_aro(s, scope),
            Statement::Match(m) => self.analyze_match(m, scope),
            Statement::ForEach(l) | Statement::ParallelForEach(l) => self.analyze_loop(l, scope),
            Statement::Publish(p) => self.analyze_publish(p, scope),
        }
    }

    fn analyze_aro(&mut self, s: &AroStatement, scope: &mut Scope) {
        if let Some(guard) = &s.guard {
            self.check_expr(guard, scope);
        }
        for expr in [&s.literal, &s.expression, &s.with].into_iter().flatten() {
            self.check_expr(expr, scope);
        }
        if let Some(clause) = &s.where_clause {
            self.check_expr(&clause.value, scope);
        }

        let Some(contract) = self.contracts.contract(&s.verb) else {
            self.push(
                Diagnostic::warning(
                    DiagnosticKind::UnknownAction {
                        verb: s.verb.clone(),
                    },
                    s.span,
                )
                .in_feature_set(&scope.name),
            );
            // Assume a binding action so later references still resolve.
            if s.literal.is_none() && scope.table.lookup(s.result.base()).is_none() {
                let _ = scope
                    .table
                    .define(s.result.base(), Visibility::Internal, s.result.noun.span);
            }
            return;
        };

        let preposition = s.object.preposition;
        if !contract.accepts(preposition) {
            self.push(
                Diagnostic::error(
                    DiagnosticKind::InvalidPreposition {
                        action: contract.name().to_string(),
                        received: preposition.as_str().to_string(),
                        expected: contract.expected_prepositions(),
                    },
                    s.span,
                )
                .in_feature_set(&scope.name),
            );
        }

        if s.expression.is_none() && !contract.is_label(preposition) {
            self.check_name(s.object.base(), s.object.noun.span, scope);
        }

        if s.literal.is_some() {
            return;
        }
        if contract.role.consumes_result() {
            self.check_name(s.result.base(), s.result.noun.span, scope);
        } else if contract.role.binds_result() {
            self.bind(s.result.base(), s.result.noun.span, scope);
        }
    }

    fn analyze_match(&mut self, m: &MatchExpression, scope: &mut Scope) {
        self.check_expr(&m.subject, scope);
        for case in &m.cases {
            if let Pattern::Noun(noun) = &case.pattern {
                self.check_name(&noun.base, noun.span, scope);
            }
            if let Some(guard) = &case.guard {
                self.check_expr(guard, scope);
            }
            self.analyze_nested(&case.body, scope);
        }
        if let Some(otherwise) = &m.otherwise {
            self.analyze_nested(otherwise, scope);
        }
    }

    fn analyze_loop(&mut self, l: &ForEachLoop, scope: &mut Scope) {
        self.check_expr(&l.collection, scope);
        scope.table.push_scope();
        self.bind(&l.item, l.span, scope);
        if let Some(index) = &l.index {
            self.bind(index, l.span, scope);
        }
        if let Some(filter) = &l.filter {
            self.check_expr(filter, scope);
        }
        self.analyze_block(&l.body, scope);
        scope.table.pop_scope();
    }

    fn analyze_publish(&mut self, p: &PublishStatement, scope: &mut Scope) {
        self.check_name(&p.internal_name, p.span, scope);
        if p.external_name != p.internal_name {
            let defined = if scope.is_preset(&p.external_name) {
                Err(p.span)
            } else {
                scope
                    .table
                    .define(&p.external_name, Visibility::Published, p.span)
            };
            if defined.is_err() {
                self.immutability(&p.external_name, p.span, scope);
            }
        }
    }

    // =========================================================================
    // Names
    // =========================================================================

    fn bind(&mut self, name: &str, span: Span, scope: &mut Scope) {
        if name.starts_with('_') {
            return;
        }
        if scope.is_preset(name)
            || scope.table.define(name, Visibility::Internal, span).is_err()
        {
            self.immutability(name, span, scope);
        }
    }

    fn immutability(&mut self, name: &str, span: Span, scope: &Scope) {
        self.push(
            Diagnostic::error(
                DiagnosticKind::ImmutabilityViolation {
                    name: name.to_string(),
                },
                span,
            )
            .in_feature_set(&scope.name),
        );
    }

    fn check_expr(&mut self, expr: &Expr, scope: &Scope) {
        let mut nouns = Vec::new();
        expr.for_each_noun(&mut |noun| nouns.push((noun.base.clone(), noun.span)));
        for (name, span) in nouns {
            self.check_name(&name, span, scope);
        }
    }

    fn check_name(&mut self, name: &str, span: Span, scope: &Scope) {
        if !self.is_resolvable(name, &scope.table) {
            self.push(
                Diagnostic::error(
                    DiagnosticKind::UndefinedVariable {
                        name: name.to_string(),
                    },
                    span,
                )
                .in_feature_set(&scope.name),
            );
        }
    }

    fn is_resolvable(&self, name: &str, table: &SymbolTable) -> bool {
        name.starts_with('_')
            || table.lookup(name).is_some()
            || self.config.externals.contains(name)
            || name.ends_with(REPOSITORY_SUFFIX)
            || self
                .published
                .get(table.business_activity())
                .is_some_and(|names| names.contains(name))
    }

    fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

/// Collects every name a block publishes, including inside nested blocks.
fn collect_published(block: &Block, names: &mut HashSet<String>) {
    for statement in block.iter() {
        match statement {
            Statement::Publish(p) => {
                names.insert(p.external_name.clone());
            }
            Statement::Match(m) => {
                for case in &m.cases {
                    collect_published(&case.body, names);
                }
                if let Some(otherwise) = &m.otherwise {
                    collect_published(otherwise, names);
                }
            }
            Statement::ForEach(l) | Statement::ParallelForEach(l) => {
                collect_published(&l.body, names);
            }
            Statement::Aro(_) => {}
        }
    }
}
