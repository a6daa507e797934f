//! Recursive-descent parser for ARO.
//!
//! The parser works over the full token vector produced by the
//! [`Lexer`](crate::lexer::Lexer), which gives it the few tokens of
//! lookahead the grammar needs (statement selection and the `<`
//! noun-versus-operator decision). Errors are accumulated: after a failed
//! statement the parser resynchronizes at the next `.` or closing `}` and
//! keeps going, so one pass reports every problem in a file.

mod expression;
mod statement;

use crate::ast::{Expr, FeatureSet, Program, StateGuard};
use crate::error::{ParseError, SyntaxErrors};
use crate::lexer::Lexer;
use crate::span::Span;
use crate::token::{Token, TokenKind};

type PResult<T> = Result<T, ParseError>;

/// Parses a complete source file.
///
/// # Errors
///
/// Returns [`SyntaxErrors::Lex`] if the source does not lex, or
/// [`SyntaxErrors::Parse`] with every parse error found.
pub fn parse_program(source: &str) -> Result<Program, SyntaxErrors> {
    let tokens = Lexer::tokenize(source)?;
    Parser::new(tokens).parse_program().map_err(SyntaxErrors::Parse)
}

/// Parses a standalone expression.
///
/// # Errors
///
/// Returns the lex error or the parse errors for the expression.
pub fn parse_expression(source: &str) -> Result<Expr, SyntaxErrors> {
    let tokens = Lexer::tokenize(source)?;
    let mut parser = Parser::new(tokens);
    let expr = parser
        .parse_expression()
        .and_then(|expr| parser.expect_eof().map(|()| expr))
        .map_err(|e| SyntaxErrors::Parse(vec![e]))?;
    Ok(expr)
}

/// Parser for ARO source code.
pub struct Parser {
    /// Tokens without comments, always ending in `Eof`.
    tokens: Vec<Token>,
    /// Index of the current token.
    pos: usize,
    /// Errors recovered from so far.
    errors: Vec<ParseError>,
}

impl Parser {
    /// Creates a parser over lexed tokens. Comment tokens are dropped.
    #[must_use]
    pub fn new(tokens: Vec<Token>) -> Self {
        let mut tokens: Vec<Token> = tokens.into_iter().filter(|t| !t.is_comment()).collect();
        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            let span = tokens
                .last()
                .map_or_else(Span::at_start, |t| Span::new(t.span.end, t.span.end, t.span.line, t.span.column));
            tokens.push(Token::new(TokenKind::Eof, "", span));
        }
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    /// Parses every feature set in the token stream.
    ///
    /// # Errors
    ///
    /// Returns all accumulated parse errors if any occurred.
    pub fn parse_program(mut self) -> Result<Program, Vec<ParseError>> {
        let mut feature_sets = Vec::new();
        while !self.at_eof() {
            if self.check(&TokenKind::LParen) {
                match self.parse_feature_set() {
                    Ok(fs) => feature_sets.push(fs),
                    Err(e) => {
                        self.errors.push(e);
                        self.skip_to_next_feature_set();
                    }
                }
            } else {
                let err = self.unexpected(&["'('"]);
                self.errors.push(err);
                self.skip_to_next_feature_set();
            }
        }

        if self.errors.is_empty() {
            Ok(Program { feature_sets })
        } else {
            Err(self.errors)
        }
    }

    // =========================================================================
    // Feature sets
    // =========================================================================

    /// `"(" words ":" words [state_guards] ")" "{" {statement} "}"`
    fn parse_feature_set(&mut self) -> PResult<FeatureSet> {
        let start = self.expect(&TokenKind::LParen, "'('")?.span;
        let name = self.parse_words("feature set name")?;
        self.expect(&TokenKind::Colon, "':'")?;
        let business_activity = self.parse_words("business activity")?;
        let state_guards = if self.check(&TokenKind::LAngle) {
            self.parse_state_guards()?
        } else {
            Vec::new()
        };
        self.expect(&TokenKind::RParen, "')'")?;
        self.expect(&TokenKind::LBrace, "'{'")?;
        let statements = self.parse_statements();
        let end = self.expect(&TokenKind::RBrace, "'}'")?.span;

        Ok(FeatureSet {
            name,
            business_activity,
            state_guards,
            statements: statements.into(),
            span: start.through(end),
        })
    }

    /// One or more header words joined by single spaces.
    fn parse_words(&mut self, what: &str) -> PResult<String> {
        let mut words: Vec<String> = Vec::new();
        loop {
            let token = self.current();
            let word = match &token.kind {
                TokenKind::Integer(_) | TokenKind::Float(_) => token.lexeme.clone(),
                TokenKind::Star => "*".to_string(),
                _ => match token.word() {
                    Some(word) => word.to_string(),
                    None => break,
                },
            };
            words.push(word);
            self.advance();
        }
        if words.is_empty() {
            return Err(self.unexpected(&[what]));
        }
        Ok(words.join(" "))
    }

    /// `"<" guard {";" guard} ">"`
    fn parse_state_guards(&mut self) -> PResult<Vec<StateGuard>> {
        self.expect(&TokenKind::LAngle, "'<'")?;
        let mut guards = vec![self.parse_state_guard()?];
        while self.eat(&TokenKind::Semicolon) {
            guards.push(self.parse_state_guard()?);
        }
        self.expect(&TokenKind::RAngle, "'>'")?;
        Ok(guards)
    }

    /// `field {"." field} ":" value {"," value}`
    fn parse_state_guard(&mut self) -> PResult<StateGuard> {
        let start = self.current().span;
        let mut field_path = vec![self.expect_word("guard field")?];
        while self.eat(&TokenKind::Dot) {
            field_path.push(self.expect_word("guard field")?);
        }
        self.expect(&TokenKind::Colon, "':'")?;
        let mut values = vec![self.parse_guard_value()?];
        while self.eat(&TokenKind::Comma) {
            values.push(self.parse_guard_value()?);
        }
        Ok(StateGuard {
            field_path,
            values,
            span: start.through(self.previous().span),
        })
    }

    fn parse_guard_value(&mut self) -> PResult<String> {
        let token = self.current().clone();
        let value = match &token.kind {
            TokenKind::String(segments) => segments
                .iter()
                .map(|s| match s {
                    crate::token::StringSegment::Text(text) => text.as_str(),
                    crate::token::StringSegment::Interpolation(source, _) => source.as_str(),
                })
                .collect(),
            TokenKind::Integer(_) | TokenKind::Float(_) | TokenKind::Boolean(_) => {
                token.lexeme.clone()
            }
            _ => match token.word() {
                Some(word) => word.to_string(),
                None => return Err(self.unexpected(&["guard value"])),
            },
        };
        self.advance();
        Ok(value)
    }

    // =========================================================================
    // Token handling
    // =========================================================================

    /// Returns the current token.
    fn current(&self) -> &Token {
        self.peek(0)
    }

    /// Returns the token `n` positions ahead, clamped to `Eof`.
    fn peek(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + n).min(last)]
    }

    /// Returns the most recently consumed token.
    fn previous(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1)]
    }

    /// Consumes the current token and returns it.
    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if !self.at_eof() {
            self.pos += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    /// Returns true if the current token has the given payload-free kind.
    fn check(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    /// Consumes the current token if it has the given kind.
    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consumes a token of the given kind or fails.
    fn expect(&mut self, kind: &TokenKind, description: &str) -> PResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&[description]))
        }
    }

    /// Consumes the contextual keyword `keyword` or fails.
    fn expect_keyword(&mut self, keyword: &str) -> PResult<Token> {
        if self.current().is_keyword(keyword) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&[&format!("'{keyword}'")]))
        }
    }

    /// Consumes a word-like token and returns its text.
    fn expect_word(&mut self, what: &str) -> PResult<String> {
        match self.current().word() {
            Some(word) => {
                let word = word.to_string();
                self.advance();
                Ok(word)
            }
            None => Err(self.unexpected(&[what])),
        }
    }

    fn expect_eof(&self) -> PResult<()> {
        if self.at_eof() {
            Ok(())
        } else {
            Err(self.unexpected(&["end of input"]))
        }
    }

    /// Builds an error at the current token.
    fn unexpected(&self, expected: &[&str]) -> ParseError {
        let token = self.current();
        ParseError::unexpected(token.kind.describe(), token.span, expected)
    }

    /// Skips an optional article.
    fn skip_article(&mut self) {
        if matches!(self.current().kind, TokenKind::Article(_)) {
            self.advance();
        }
    }

    // =========================================================================
    // Recovery
    // =========================================================================

    /// Skips to just past the next `.` at this nesting depth, or to the
    /// `}` that closes the current block.
    fn synchronize_statement(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.current().kind {
                TokenKind::Eof => return,
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                TokenKind::Dot if depth == 0 => {
                    self.advance();
                    return;
                }
                _ => {}
            }
            self.advance();
        }
    }

    /// Skips to the next `(` outside any braces.
    fn skip_to_next_feature_set(&mut self) {
        let mut depth = 0usize;
        self.advance();
        loop {
            match self.current().kind {
                TokenKind::Eof => return,
                TokenKind::LParen if depth == 0 => return,
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.advance();
        }
    }
}
