//! Statement productions.

use std::sync::Arc;

use super::{PResult, Parser};
use crate::ast::{
    AroStatement, Block, EXPRESSION_BINDING, Expr, ForEachLoop, LITERAL_BINDING,
    MatchCase, MatchExpression, ObjectDescriptor, Pattern, PublishStatement, QualifiedNoun,
    ResultDescriptor, Statement, WhereClause,
};
use crate::error::ParseError;
use crate::token::{Preposition, TokenKind};

impl Parser {
    /// Parses statements until a closing `}` or end of input, recovering
    /// from errors statement by statement.
    pub(super) fn parse_statements(&mut self) -> Vec<Statement> {
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            match self.parse_statement() {
                Ok(statement) => statements.push(statement),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize_statement();
                }
            }
        }
        statements
    }

    /// `"{" {statement} "}"`
    fn parse_block(&mut self) -> PResult<Block> {
        self.expect(&TokenKind::LBrace, "'{'")?;
        let statements = self.parse_statements();
        self.expect(&TokenKind::RBrace, "'}'")?;
        Ok(Arc::from(statements))
    }

    /// Selects the statement variant from the leading tokens.
    fn parse_statement(&mut self) -> PResult<Statement> {
        let token = self.current();
        if token.is_keyword("when") {
            return self.parse_guarded_statement().map(Statement::Aro);
        }
        if token.is_keyword("match") {
            return self.parse_match().map(Statement::Match);
        }
        if token.kind == TokenKind::Preposition(Preposition::For) && self.peek(1).is_keyword("each")
        {
            return self.parse_for_each(false).map(Statement::ForEach);
        }
        if token.is_keyword("parallel") {
            return self.parse_for_each(true).map(Statement::ParallelForEach);
        }
        if token.kind == TokenKind::LAngle {
            let is_publish = self
                .peek(1)
                .word()
                .is_some_and(|w| w.eq_ignore_ascii_case("publish"))
                && self.peek(2).kind == TokenKind::RAngle;
            if is_publish {
                return self.parse_publish().map(Statement::Publish);
            }
            return self.parse_aro_statement().map(Statement::Aro);
        }
        Err(self.unexpected(&["'<'", "'when'", "'match'", "'for'", "'parallel'"]))
    }

    /// `"when" expression aro_statement`
    fn parse_guarded_statement(&mut self) -> PResult<AroStatement> {
        let start = self.expect_keyword("when")?.span;
        let guard = self.parse_expression()?;
        let mut statement = self.parse_aro_statement()?;
        if statement.guard.is_some() {
            return Err(ParseError::new(
                "statement has both a leading and a trailing 'when' guard",
                "'when'",
                statement.span,
            ));
        }
        statement.guard = Some(guard);
        statement.span = start.through(statement.span);
        Ok(statement)
    }

    /// `"<" verb ">" [article] result preposition [article] object
    ///  {with | where} ["when" expr] "."`
    fn parse_aro_statement(&mut self) -> PResult<AroStatement> {
        let start = self.expect(&TokenKind::LAngle, "'<'")?.span;
        let verb = self.expect_word("action verb")?;
        self.expect(&TokenKind::RAngle, "'>'")?;
        self.skip_article();

        let (result, literal) = if self.check(&TokenKind::LAngle) {
            (ResultDescriptor::new(self.parse_noun()?), None)
        } else {
            let span = self.current().span;
            let value = self.parse_expression().map_err(|_| self.unexpected(&["'<'", "literal"]))?;
            let noun = QualifiedNoun::new(LITERAL_BINDING, Vec::new(), span);
            (ResultDescriptor::new(noun), Some(value))
        };

        let preposition = match self.current().kind {
            TokenKind::Preposition(prep) => {
                self.advance();
                prep
            }
            _ => return Err(self.unexpected(&["preposition"])),
        };
        self.skip_article();

        let object_span = self.current().span;
        let (object, expression) = match self.parse_expression()? {
            Expr::Noun(noun) => (ObjectDescriptor::new(preposition, noun), None),
            other => {
                let noun = QualifiedNoun::new(EXPRESSION_BINDING, Vec::new(), object_span);
                (ObjectDescriptor::new(preposition, noun), Some(other))
            }
        };

        let mut statement = AroStatement {
            verb,
            result,
            object,
            literal,
            expression,
            with: None,
            where_clause: None,
            guard: None,
            span: start,
        };

        loop {
            if self.check(&TokenKind::Preposition(Preposition::With)) && statement.with.is_none() {
                self.advance();
                statement.with = Some(self.parse_expression()?);
            } else if self.current().is_keyword("where") && statement.where_clause.is_none() {
                statement.where_clause = Some(self.parse_where_clause()?);
            } else {
                break;
            }
        }

        if self.current().is_keyword("when") {
            self.advance();
            statement.guard = Some(self.parse_expression()?);
        }

        if !self.check(&TokenKind::Dot) {
            let mut expected = vec!["'.'", "'when'"];
            if statement.with.is_none() {
                expected.push("'with'");
            }
            if statement.where_clause.is_none() {
                expected.push("'where'");
            }
            return Err(self.unexpected(&expected));
        }
        let end = self.advance().span;
        statement.span = start.through(end);
        Ok(statement)
    }

    /// `"where" (field | "<" field ">") ("=" | "==" | "is") expression`
    fn parse_where_clause(&mut self) -> PResult<WhereClause> {
        let start = self.expect_keyword("where")?.span;
        let angled = self.eat(&TokenKind::LAngle);
        let field = self.expect_word("field name")?;
        if angled {
            self.expect(&TokenKind::RAngle, "'>'")?;
        }
        let has_operator = if self.current().is_keyword("is") {
            self.advance();
            true
        } else {
            self.eat(&TokenKind::Equal) || self.eat(&TokenKind::EqualEqual)
        };
        if !has_operator {
            return Err(self.unexpected(&["'='", "'=='", "'is'"]));
        }
        let value = self.parse_expression()?;
        Ok(WhereClause {
            field,
            span: start.through(value.span()),
            value,
        })
    }

    /// `"<" base [":" specifier {specifier}] ">"`
    pub(super) fn parse_noun(&mut self) -> PResult<QualifiedNoun> {
        let start = self.expect(&TokenKind::LAngle, "'<'")?.span;
        let base = self.expect_word("noun")?;
        let mut specifiers = Vec::new();
        if self.eat(&TokenKind::Colon) {
            loop {
                specifiers.push(self.parse_specifier()?);
                if self.check(&TokenKind::RAngle) {
                    break;
                }
            }
        }
        let end = self.expect(&TokenKind::RAngle, "'>'")?.span;
        Ok(QualifiedNoun::new(base, specifiers, start.through(end)))
    }

    /// `word {"." word} | integer`
    fn parse_specifier(&mut self) -> PResult<String> {
        if let TokenKind::Integer(n) = self.current().kind {
            self.advance();
            return Ok(n.to_string());
        }
        let mut specifier = self.expect_word("specifier")?;
        while self.check(&TokenKind::Dot) && self.peek(1).word().is_some() {
            self.advance();
            specifier.push('.');
            specifier.push_str(&self.expect_word("specifier")?);
        }
        Ok(specifier)
    }

    /// `"match" expression "{" {case} ["otherwise" block] "}"`
    fn parse_match(&mut self) -> PResult<MatchExpression> {
        let start = self.expect_keyword("match")?.span;
        let subject = self.parse_expression()?;
        self.expect(&TokenKind::LBrace, "'{'")?;

        let mut cases = Vec::new();
        let mut otherwise = None;
        loop {
            let token = self.current();
            if token.is_keyword("case") && otherwise.is_none() {
                cases.push(self.parse_case()?);
            } else if token.is_keyword("otherwise") && otherwise.is_none() {
                self.advance();
                otherwise = Some(self.parse_block()?);
            } else if token.kind == TokenKind::RBrace {
                break;
            } else if otherwise.is_some() {
                return Err(self.unexpected(&["'}'"]));
            } else {
                return Err(self.unexpected(&["'case'", "'otherwise'", "'}'"]));
            }
        }
        let end = self.expect(&TokenKind::RBrace, "'}'")?.span;

        Ok(MatchExpression {
            subject,
            cases,
            otherwise,
            span: start.through(end),
        })
    }

    /// `"case" pattern ["where" expression] block`
    fn parse_case(&mut self) -> PResult<MatchCase> {
        let start = self.expect_keyword("case")?.span;
        let pattern = self.parse_pattern()?;
        let guard = if self.current().is_keyword("where") {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        Ok(MatchCase {
            pattern,
            guard,
            body,
            span: start.through(self.previous().span),
        })
    }

    /// `literal | "<" noun ">" | "_"`
    fn parse_pattern(&mut self) -> PResult<Pattern> {
        if self.current().is_keyword("_") {
            self.advance();
            return Ok(Pattern::Wildcard);
        }
        if self.check(&TokenKind::LAngle) {
            return self.parse_noun().map(Pattern::Noun);
        }
        match self.parse_unary() {
            Ok(Expr::Literal(literal, _)) => Ok(Pattern::Literal(literal)),
            _ => Err(ParseError::unexpected(
                "non-literal pattern",
                self.previous().span,
                &["literal", "'<'", "'_'"],
            )),
        }
    }

    /// `["parallel"] "for" "each" "<" item ">" ["at" "<" index ">"] "in" expression
    ///  ["where" expression] ["with" "<" "concurrency" ":" integer ">"] block`
    fn parse_for_each(&mut self, parallel: bool) -> PResult<ForEachLoop> {
        let start = self.current().span;
        if parallel {
            self.expect_keyword("parallel")?;
        }
        self.expect(&TokenKind::Preposition(Preposition::For), "'for'")?;
        self.expect_keyword("each")?;
        let item = self.parse_loop_name()?;
        let index = if self.eat(&TokenKind::Preposition(Preposition::At)) {
            Some(self.parse_loop_name()?)
        } else {
            None
        };
        self.expect_keyword("in")?;
        let collection = self.parse_expression()?;
        let filter = if self.current().is_keyword("where") {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };
        let concurrency = if parallel && self.eat(&TokenKind::Preposition(Preposition::With)) {
            Some(self.parse_concurrency()?)
        } else {
            None
        };
        let body = self.parse_block()?;

        Ok(ForEachLoop {
            item,
            index,
            collection,
            filter,
            concurrency,
            body,
            span: start.through(self.previous().span),
        })
    }

    /// `"<" name ">"`
    fn parse_loop_name(&mut self) -> PResult<String> {
        self.expect(&TokenKind::LAngle, "'<'")?;
        let name = self.expect_word("loop variable")?;
        self.expect(&TokenKind::RAngle, "'>'")?;
        Ok(name)
    }

    /// `"<" "concurrency" ":" integer ">"`
    fn parse_concurrency(&mut self) -> PResult<usize> {
        self.expect(&TokenKind::LAngle, "'<'")?;
        self.expect_keyword("concurrency")?;
        self.expect(&TokenKind::Colon, "':'")?;
        let token = self.current().clone();
        let limit = match token.kind {
            TokenKind::Integer(n) if n > 0 => usize::try_from(n).unwrap_or(usize::MAX),
            _ => return Err(self.unexpected(&["positive integer"])),
        };
        self.advance();
        self.expect(&TokenKind::RAngle, "'>'")?;
        Ok(limit)
    }

    /// `"<" "Publish" ">" "as" [article] noun [article] noun "."`
    fn parse_publish(&mut self) -> PResult<PublishStatement> {
        let start = self.expect(&TokenKind::LAngle, "'<'")?.span;
        self.advance(); // Publish
        self.expect(&TokenKind::RAngle, "'>'")?;
        self.expect_keyword("as")?;
        self.skip_article();
        let external = self.parse_noun()?;
        self.skip_article();
        let internal = self.parse_noun()?;
        let end = self.expect(&TokenKind::Dot, "'.'")?.span;
        Ok(PublishStatement {
            external_name: external.base,
            internal_name: internal.base,
            span: start.through(end),
        })
    }
}
