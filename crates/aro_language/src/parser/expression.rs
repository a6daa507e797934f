//! Expression productions, using precedence climbing.
//!
//! | level | operators                    |
//! |-------|------------------------------|
//! | 8     | `.field`, `[index]`          |
//! | 7     | unary `-`, `not`             |
//! | 6     | `*` `/` `%`                  |
//! | 5     | `+` `-` `++`                 |
//! | 4     | `<` `<=` `>` `>=`            |
//! | 3     | `==` `!=` `is` `is not`      |
//! | 2     | `and`                        |
//! | 1     | `or`                         |

use super::{PResult, Parser};
use crate::ast::{BinaryOp, Expr, Literal, StringPart, UnaryOp};
use crate::error::ParseError;
use crate::lexer::Lexer;
use crate::span::Span;
use crate::token::{StringSegment, TokenKind};

impl Parser {
    /// Parses a full expression.
    pub(crate) fn parse_expression(&mut self) -> PResult<Expr> {
        self.parse_binary(1)
    }

    fn parse_binary(&mut self, min_precedence: u8) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;
        while let Some((op, width)) = self.peek_binary_op() {
            if op.precedence() < min_precedence {
                break;
            }
            for _ in 0..width {
                self.advance();
            }
            let rhs = self.parse_binary(op.precedence() + 1)?;
            let span = lhs.span().through(rhs.span());
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs), span);
        }
        Ok(lhs)
    }

    /// Recognizes a binary operator at the current position, returning it
    /// with the number of tokens it spans.
    fn peek_binary_op(&self) -> Option<(BinaryOp, usize)> {
        let token = self.current();
        let op = match &token.kind {
            TokenKind::Identifier(word) => match word.as_str() {
                "or" => BinaryOp::Or,
                "and" => BinaryOp::And,
                "is" if self.peek(1).is_keyword("not") => return Some((BinaryOp::Ne, 2)),
                "is" => BinaryOp::Eq,
                _ => return None,
            },
            TokenKind::EqualEqual => BinaryOp::Eq,
            TokenKind::NotEqual => BinaryOp::Ne,
            TokenKind::LAngle if self.noun_starts_at(0) => return None,
            TokenKind::LAngle => BinaryOp::Lt,
            TokenKind::LessEqual => BinaryOp::Le,
            TokenKind::RAngle => BinaryOp::Gt,
            TokenKind::GreaterEqual => BinaryOp::Ge,
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Concat => BinaryOp::Concat,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Rem,
            _ => return None,
        };
        Some((op, 1))
    }

    /// A `<` opens a noun, not a comparison, when followed by a word and
    /// then `>` or `:`.
    fn noun_starts_at(&self, offset: usize) -> bool {
        self.peek(offset).kind == TokenKind::LAngle
            && self.peek(offset + 1).word().is_some()
            && matches!(
                self.peek(offset + 2).kind,
                TokenKind::RAngle | TokenKind::Colon
            )
    }

    /// Unary `-` and `not`. A minus directly before a numeric literal folds
    /// into a negative literal.
    pub(super) fn parse_unary(&mut self) -> PResult<Expr> {
        let token = self.current().clone();
        let op = if token.kind == TokenKind::Minus {
            UnaryOp::Neg
        } else if token.is_keyword("not") {
            UnaryOp::Not
        } else {
            return self.parse_postfix();
        };
        self.advance();
        let operand = self.parse_unary()?;
        let span = token.span.through(operand.span());
        Ok(match (op, operand) {
            (UnaryOp::Neg, Expr::Literal(Literal::Integer(n), _)) => {
                Expr::Literal(Literal::Integer(n.wrapping_neg()), span)
            }
            (UnaryOp::Neg, Expr::Literal(Literal::Float(n), _)) => {
                Expr::Literal(Literal::Float(-n), span)
            }
            (op, operand) => Expr::Unary(op, Box::new(operand), span),
        })
    }

    /// Member access and indexing. Both must adjoin the preceding token, so a
    /// statement-ending `.` is never read as member access.
    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            let attached = self.previous().span.adjoins(&self.current().span);
            match self.current().kind {
                TokenKind::Dot
                    if attached
                        && self.peek(1).word().is_some()
                        && self.current().span.adjoins(&self.peek(1).span) =>
                {
                    self.advance();
                    let field = self.advance();
                    let name = field.word().unwrap_or_default().to_string();
                    let span = expr.span().through(field.span);
                    expr = Expr::Member(Box::new(expr), name, span);
                }
                TokenKind::LBracket if attached => {
                    self.advance();
                    let index = self.parse_expression()?;
                    let end = self.expect(&TokenKind::RBracket, "']'")?.span;
                    let span = expr.span().through(end);
                    expr = Expr::Index(Box::new(expr), Box::new(index), span);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let token = self.current().clone();
        let literal = match &token.kind {
            TokenKind::LAngle => return self.parse_noun().map(Expr::Noun),
            TokenKind::LBracket => return self.parse_list(),
            TokenKind::LBrace => return self.parse_map(),
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RParen, "')'")?;
                return Ok(inner);
            }
            TokenKind::String(segments) => {
                self.advance();
                return Self::build_string(segments, token.span);
            }
            TokenKind::Integer(n) => Literal::Integer(*n),
            TokenKind::Float(n) => Literal::Float(*n),
            TokenKind::Boolean(b) => Literal::Boolean(*b),
            TokenKind::Null => Literal::Null,
            _ => return Err(self.unexpected(&["expression"])),
        };
        self.advance();
        Ok(Expr::Literal(literal, token.span))
    }

    /// `"[" [expr {"," expr} [","]] "]"`
    fn parse_list(&mut self) -> PResult<Expr> {
        let start = self.expect(&TokenKind::LBracket, "'['")?.span;
        let mut items = Vec::new();
        while !self.check(&TokenKind::RBracket) {
            items.push(self.parse_expression()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let end = self.expect(&TokenKind::RBracket, "']'")?.span;
        Ok(Expr::List(items, start.through(end)))
    }

    /// `"{" [key ":" expr {"," key ":" expr} [","]] "}"`
    fn parse_map(&mut self) -> PResult<Expr> {
        let start = self.expect(&TokenKind::LBrace, "'{'")?.span;
        let mut entries = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let key = match &self.current().kind {
                TokenKind::String(segments) => match segments.as_slice() {
                    [StringSegment::Text(text)] => text.clone(),
                    _ => return Err(self.unexpected(&["map key"])),
                },
                _ => match self.current().word() {
                    Some(word) => word.to_string(),
                    None => return Err(self.unexpected(&["map key"])),
                },
            };
            self.advance();
            self.expect(&TokenKind::Colon, "':'")?;
            entries.push((key, self.parse_expression()?));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let end = self.expect(&TokenKind::RBrace, "'}'")?.span;
        Ok(Expr::Map(entries, start.through(end)))
    }

    /// Turns lexed string segments into a literal or an interpolation,
    /// parsing each `${...}` source as an expression.
    fn build_string(segments: &[StringSegment], span: Span) -> PResult<Expr> {
        if let [StringSegment::Text(text)] = segments {
            return Ok(Expr::Literal(Literal::String(text.clone()), span));
        }
        let mut parts = Vec::with_capacity(segments.len());
        for segment in segments {
            match segment {
                StringSegment::Text(text) => parts.push(StringPart::Text(text.clone())),
                StringSegment::Interpolation(source, origin) => {
                    let tokens = Lexer::at(source, *origin)
                        .collect_tokens()
                        .map_err(|e| ParseError::new(e.to_string(), "interpolation", e.span()))?;
                    let mut inner = Parser::new(tokens);
                    let expr = inner.parse_expression()?;
                    inner.expect_eof()?;
                    parts.push(StringPart::Expr(expr));
                }
            }
        }
        Ok(Expr::Interpolated(parts, span))
    }
}
