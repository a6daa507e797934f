//! Pretty-printer for ARO programs.
//!
//! Output is canonical source: every noun gets `the`, statements are
//! indented per block, and parentheses appear only where precedence
//! requires them. Parsing the output yields the same tree up to spans.
//!
//! # Example
//!
//! ```
//! use aro_language::{parse_program, pretty::print_program};
//!
//! let program = parse_program("(Hello: Demo) { <Log> \"hi\" to <console>. }").unwrap();
//! assert_eq!(
//!     print_program(&program),
//!     "(Hello: Demo) {\n    <Log> \"hi\" to the <console>.\n}\n"
//! );
//! ```

use crate::ast::{
    AroStatement, Block, Expr, FeatureSet, ForEachLoop, Literal, MatchExpression, Pattern, Program,
    QualifiedNoun, Statement, StringPart, UnaryOp,
};

/// Configuration for pretty-printing.
#[derive(Debug, Clone)]
pub struct PrettyConfig {
    /// Number of spaces for each indentation level.
    pub indent_width: usize,
}

impl Default for PrettyConfig {
    fn default() -> Self {
        Self { indent_width: 4 }
    }
}

/// Pretty-print a whole program.
#[must_use]
pub fn print_program(program: &Program) -> String {
    print_program_with_config(program, &PrettyConfig::default())
}

/// Pretty-print a whole program with custom configuration.
#[must_use]
pub fn print_program_with_config(program: &Program, config: &PrettyConfig) -> String {
    let mut printer = PrettyPrinter::new(config.clone());
    for (i, feature_set) in program.feature_sets.iter().enumerate() {
        if i > 0 {
            printer.output.push('\n');
        }
        printer.print_feature_set(feature_set);
    }
    printer.output
}

/// Pretty-print a single statement at indentation level zero.
#[must_use]
pub fn print_statement(statement: &Statement) -> String {
    let mut printer = PrettyPrinter::new(PrettyConfig::default());
    printer.print_statement(statement);
    printer.output.trim_end().to_string()
}

/// Pretty-print an expression.
#[must_use]
pub fn print_expression(expr: &Expr) -> String {
    let mut printer = PrettyPrinter::new(PrettyConfig::default());
    printer.print_expr(expr);
    printer.output
}

/// Pretty-printer state.
struct PrettyPrinter {
    config: PrettyConfig,
    output: String,
    indent_level: usize,
}

impl PrettyPrinter {
    fn new(config: PrettyConfig) -> Self {
        Self {
            config,
            output: String::new(),
            indent_level: 0,
        }
    }

    fn indent(&mut self) {
        let width = self.indent_level * self.config.indent_width;
        self.output.extend(std::iter::repeat_n(' ', width));
    }

    // =========================================================================
    // Structure
    // =========================================================================

    fn print_feature_set(&mut self, feature_set: &FeatureSet) {
        self.output.push('(');
        self.output.push_str(&feature_set.name);
        self.output.push_str(": ");
        self.output.push_str(&feature_set.business_activity);
        if !feature_set.state_guards.is_empty() {
            self.output.push('<');
            for (i, guard) in feature_set.state_guards.iter().enumerate() {
                if i > 0 {
                    self.output.push(';');
                }
                self.output.push_str(&guard.field_path.join("."));
                self.output.push(':');
                for (j, value) in guard.values.iter().enumerate() {
                    if j > 0 {
                        self.output.push(',');
                    }
                    self.print_guard_value(value);
                }
            }
            self.output.push('>');
        }
        self.output.push_str(") ");
        self.print_block(&feature_set.statements);
        self.output.push('\n');
    }

    fn print_guard_value(&mut self, value: &str) {
        let bare = (value.parse::<f64>().is_ok() && value.starts_with(|c: char| c.is_ascii_digit()))
            || is_bare_word(value)
            || value.split('-').all(is_bare_word);
        if bare {
            self.output.push_str(value);
        } else {
            self.print_string(value);
        }
    }

    /// Prints `{`, the statements one level deeper, then `}` without a
    /// trailing newline.
    fn print_block(&mut self, block: &Block) {
        self.output.push_str("{\n");
        self.indent_level += 1;
        for statement in block.iter() {
            self.print_statement(statement);
        }
        self.indent_level -= 1;
        self.indent();
        self.output.push('}');
    }

    fn print_statement(&mut self, statement: &Statement) {
        self.indent();
        match statement {
            Statement::Aro(s) => self.print_aro(s),
            Statement::Match(m) => self.print_match(m),
            Statement::ForEach(l) => self.print_for_each(l, false),
            Statement::ParallelForEach(l) => self.print_for_each(l, true),
            Statement::Publish(p) => {
                self.output.push_str("<Publish> as the <");
                self.output.push_str(&p.external_name);
                self.output.push_str("> the <");
                self.output.push_str(&p.internal_name);
                self.output.push_str(">.");
            }
        }
        self.output.push('\n');
    }

    fn print_aro(&mut self, s: &AroStatement) {
        self.output.push('<');
        self.output.push_str(&s.verb);
        self.output.push_str("> ");

        match &s.literal {
            // A noun-headed expression in result position would parse as
            // the result noun.
            Some(expr @ (Expr::Literal(..) | Expr::Interpolated(..) | Expr::List(..) | Expr::Map(..))) => {
                self.print_expr(expr);
            }
            Some(expr) => self.print_parenthesized(expr),
            None => {
                self.output.push_str("the ");
                self.print_noun(&s.result.noun);
            }
        }

        self.output.push(' ');
        self.output.push_str(s.object.preposition.as_str());
        self.output.push(' ');
        match &s.expression {
            Some(expr) => self.print_expr(expr),
            None => {
                self.output.push_str("the ");
                self.print_noun(&s.object.noun);
            }
        }

        if let Some(with) = &s.with {
            self.output.push_str(" with ");
            self.print_expr(with);
        }
        if let Some(clause) = &s.where_clause {
            self.output.push_str(" where ");
            self.output.push_str(&clause.field);
            self.output.push_str(" = ");
            self.print_expr(&clause.value);
        }
        if let Some(guard) = &s.guard {
            self.output.push_str(" when ");
            self.print_expr(guard);
        }
        self.output.push('.');
    }

    fn print_match(&mut self, m: &MatchExpression) {
        self.output.push_str("match ");
        self.print_expr(&m.subject);
        self.output.push_str(" {\n");
        self.indent_level += 1;
        for case in &m.cases {
            self.indent();
            self.output.push_str("case ");
            match &case.pattern {
                Pattern::Literal(literal) => self.print_literal(literal),
                Pattern::Noun(noun) => self.print_noun(noun),
                Pattern::Wildcard => self.output.push('_'),
            }
            if let Some(guard) = &case.guard {
                self.output.push_str(" where ");
                self.print_expr(guard);
            }
            self.output.push(' ');
            self.print_block(&case.body);
            self.output.push('\n');
        }
        if let Some(otherwise) = &m.otherwise {
            self.indent();
            self.output.push_str("otherwise ");
            self.print_block(otherwise);
            self.output.push('\n');
        }
        self.indent_level -= 1;
        self.indent();
        self.output.push('}');
    }

    fn print_for_each(&mut self, l: &ForEachLoop, parallel: bool) {
        if parallel {
            self.output.push_str("parallel ");
        }
        self.output.push_str("for each <");
        self.output.push_str(&l.item);
        self.output.push('>');
        if let Some(index) = &l.index {
            self.output.push_str(" at <");
            self.output.push_str(index);
            self.output.push('>');
        }
        self.output.push_str(" in ");
        self.print_expr(&l.collection);
        if let Some(filter) = &l.filter {
            self.output.push_str(" where ");
            self.print_expr(filter);
        }
        if let Some(limit) = l.concurrency {
            self.output.push_str(" with <concurrency: ");
            self.output.push_str(&limit.to_string());
            self.output.push('>');
        }
        self.output.push(' ');
        self.print_block(&l.body);
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn print_noun(&mut self, noun: &QualifiedNoun) {
        self.output.push_str(&noun.to_string());
    }

    fn print_parenthesized(&mut self, expr: &Expr) {
        self.output.push('(');
        self.print_expr(expr);
        self.output.push(')');
    }

    fn print_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(literal, _) => self.print_literal(literal),
            Expr::Interpolated(parts, _) => {
                self.output.push('"');
                for part in parts {
                    match part {
                        StringPart::Text(text) => self.print_string_body(text),
                        StringPart::Expr(inner) => {
                            self.output.push_str("${");
                            self.print_expr(inner);
                            self.output.push('}');
                        }
                    }
                }
                self.output.push('"');
            }
            Expr::Noun(noun) => self.print_noun(noun),
            Expr::List(items, _) => {
                self.output.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.output.push_str(", ");
                    }
                    self.print_expr(item);
                }
                self.output.push(']');
            }
            Expr::Map(entries, _) => {
                if entries.is_empty() {
                    self.output.push_str("{}");
                    return;
                }
                self.output.push_str("{ ");
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        self.output.push_str(", ");
                    }
                    if is_bare_word(key) {
                        self.output.push_str(key);
                    } else {
                        self.print_string(key);
                    }
                    self.output.push_str(": ");
                    self.print_expr(value);
                }
                self.output.push_str(" }");
            }
            Expr::Unary(op, operand, _) => {
                self.output.push_str(match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "not ",
                });
                if matches!(**operand, Expr::Binary(..)) {
                    self.print_parenthesized(operand);
                } else {
                    self.print_expr(operand);
                }
            }
            Expr::Binary(op, lhs, rhs, _) => {
                let precedence = op.precedence();
                self.print_operand(lhs, |p| p < precedence);
                self.output.push(' ');
                self.output.push_str(op.symbol());
                self.output.push(' ');
                self.print_operand(rhs, |p| p <= precedence);
            }
            Expr::Member(base, field, _) => {
                self.print_postfix_base(base);
                self.output.push('.');
                self.output.push_str(field);
            }
            Expr::Index(base, index, _) => {
                self.print_postfix_base(base);
                self.output.push('[');
                self.print_expr(index);
                self.output.push(']');
            }
        }
    }

    fn print_operand(&mut self, operand: &Expr, needs_parens: impl Fn(u8) -> bool) {
        match operand {
            Expr::Binary(op, ..) if needs_parens(op.precedence()) => {
                self.print_parenthesized(operand);
            }
            _ => self.print_expr(operand),
        }
    }

    fn print_postfix_base(&mut self, base: &Expr) {
        let needs_parens = match base {
            Expr::Binary(..) | Expr::Unary(..) => true,
            Expr::Literal(Literal::Integer(n), _) => *n < 0,
            Expr::Literal(Literal::Float(n), _) => n.is_sign_negative(),
            _ => false,
        };
        if needs_parens {
            self.print_parenthesized(base);
        } else {
            self.print_expr(base);
        }
    }

    fn print_literal(&mut self, literal: &Literal) {
        match literal {
            Literal::String(s) => self.print_string(s),
            Literal::Integer(n) => self.output.push_str(&n.to_string()),
            Literal::Float(n) => self.print_float(*n),
            Literal::Boolean(true) => self.output.push_str("true"),
            Literal::Boolean(false) => self.output.push_str("false"),
            Literal::Null => self.output.push_str("null"),
        }
    }

    fn print_float(&mut self, n: f64) {
        let s = n.to_string();
        self.output.push_str(&s);
        if !s.contains('.') {
            self.output.push_str(".0");
        }
    }

    fn print_string(&mut self, s: &str) {
        self.output.push('"');
        self.print_string_body(s);
        self.output.push('"');
    }

    fn print_string_body(&mut self, s: &str) {
        for c in s.chars() {
            match c {
                '"' => self.output.push_str("\\\""),
                '\\' => self.output.push_str("\\\\"),
                '\n' => self.output.push_str("\\n"),
                '\r' => self.output.push_str("\\r"),
                '\t' => self.output.push_str("\\t"),
                '\0' => self.output.push_str("\\0"),
                '$' => self.output.push_str("\\$"),
                _ => self.output.push(c),
            }
        }
    }
}

/// Returns true if `word` lexes back as a single identifier.
fn is_bare_word(word: &str) -> bool {
    let mut chars = word.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
        && !matches!(word, "true" | "false" | "null")
}
