//! Lexer for the ARO language.
//!
//! The lexer converts source text into a stream of tokens. It does not
//! recover: the first malformed literal, comment or character is reported
//! as a [`LexError`] and lexing of that source stops.

use crate::error::LexError;
use crate::span::Span;
use crate::token::{Article, Preposition, StringSegment, Token, TokenKind};

/// Lexer for ARO source code.
pub struct Lexer<'src> {
    /// Source text being tokenized.
    source: &'src str,
    /// Remaining source text.
    rest: &'src str,
    /// Byte offset of `source` within the enclosing file.
    origin: usize,
    /// Current byte offset in `source`.
    position: usize,
    /// Current line number (1-based).
    line: u32,
    /// Current column number (1-based).
    column: u32,
}

impl<'src> Lexer<'src> {
    /// Creates a new lexer for the given source.
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        Self::at(source, Span::at_start())
    }

    /// Creates a lexer for a fragment that starts at `origin` in a larger
    /// file, so that spans point into that file. Used for `${...}`
    /// interpolations.
    #[must_use]
    pub fn at(source: &'src str, origin: Span) -> Self {
        Self {
            source,
            rest: source,
            origin: origin.start,
            position: 0,
            line: origin.line,
            column: origin.column,
        }
    }

    /// Tokenizes all source, comments included, ending with `Eof`.
    ///
    /// # Errors
    ///
    /// Returns the first [`LexError`] encountered.
    pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
        Lexer::new(source).collect_tokens()
    }

    /// Tokenizes the rest of this lexer's input.
    ///
    /// # Errors
    ///
    /// Returns the first [`LexError`] encountered.
    pub fn collect_tokens(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                return Ok(tokens);
            }
        }
    }

    /// Returns the next token from the source.
    ///
    /// # Errors
    ///
    /// Returns a [`LexError`] for unterminated literals and comments,
    /// invalid escapes and numbers, and unrecognized characters.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();

        let start = self.position;
        let line = self.line;
        let column = self.column;

        let Some(c) = self.peek_char() else {
            return Ok(Token::new(TokenKind::Eof, "", self.span_from(start, line, column)));
        };

        let kind = match c {
            '(' if self.peek_char_n(1) == Some('*') => self.scan_block_comment(start, line, column)?,
            '/' if self.peek_char_n(1) == Some('/') => self.scan_line_comment(),
            '"' => self.scan_string(start, line, column)?,
            c if c.is_ascii_digit() => self.scan_number(start, line, column)?,
            c if is_word_start(c) => self.scan_word(),
            _ => self.scan_punctuation(c, start, line, column)?,
        };

        let span = self.span_from(start, line, column);
        Ok(Token::new(kind, &self.source[start..self.position], span))
    }

    fn span_from(&self, start: usize, line: u32, column: u32) -> Span {
        Span::new(self.origin + start, self.origin + self.position, line, column)
    }

    /// Peeks at the next character without consuming it.
    fn peek_char(&self) -> Option<char> {
        self.rest.chars().next()
    }

    /// Peeks `n` characters ahead.
    fn peek_char_n(&self, n: usize) -> Option<char> {
        self.rest.chars().nth(n)
    }

    /// Advances past the next character.
    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            let len = c.len_utf8();
            self.rest = &self.rest[len..];
            self.position += len;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn advance_by(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn scan_punctuation(
        &mut self,
        c: char,
        start: usize,
        line: u32,
        column: u32,
    ) -> Result<TokenKind, LexError> {
        let next = self.peek_char_n(1);
        let (kind, width) = match (c, next) {
            ('+', Some('+')) => (TokenKind::Concat, 2),
            ('<', Some('=')) => (TokenKind::LessEqual, 2),
            ('>', Some('=')) => (TokenKind::GreaterEqual, 2),
            ('=', Some('=')) => (TokenKind::EqualEqual, 2),
            ('!', Some('=')) => (TokenKind::NotEqual, 2),
            ('(', _) => (TokenKind::LParen, 1),
            (')', _) => (TokenKind::RParen, 1),
            ('[', _) => (TokenKind::LBracket, 1),
            (']', _) => (TokenKind::RBracket, 1),
            ('{', _) => (TokenKind::LBrace, 1),
            ('}', _) => (TokenKind::RBrace, 1),
            ('<', _) => (TokenKind::LAngle, 1),
            ('>', _) => (TokenKind::RAngle, 1),
            (':', _) => (TokenKind::Colon, 1),
            ('.', _) => (TokenKind::Dot, 1),
            (',', _) => (TokenKind::Comma, 1),
            (';', _) => (TokenKind::Semicolon, 1),
            ('+', _) => (TokenKind::Plus, 1),
            ('-', _) => (TokenKind::Minus, 1),
            ('*', _) => (TokenKind::Star, 1),
            ('/', _) => (TokenKind::Slash, 1),
            ('%', _) => (TokenKind::Percent, 1),
            ('=', _) => (TokenKind::Equal, 1),
            _ => {
                self.advance();
                return Err(LexError::UnexpectedCharacter {
                    character: c,
                    span: self.span_from(start, line, column),
                });
            }
        };
        self.advance_by(width);
        Ok(kind)
    }

    /// Scans a `(* ... *)` comment.
    fn scan_block_comment(
        &mut self,
        start: usize,
        line: u32,
        column: u32,
    ) -> Result<TokenKind, LexError> {
        self.advance_by(2);
        let body_start = self.position;
        loop {
            match self.peek_char() {
                Some('*') if self.peek_char_n(1) == Some(')') => {
                    let body = self.source[body_start..self.position].trim().to_string();
                    self.advance_by(2);
                    return Ok(TokenKind::Comment(body));
                }
                Some(_) => self.advance(),
                None => {
                    return Err(LexError::UnterminatedComment(
                        self.span_from(start, line, column),
                    ));
                }
            }
        }
    }

    /// Scans a `// ...` comment up to the end of the line.
    fn scan_line_comment(&mut self) -> TokenKind {
        self.advance_by(2);
        let body_start = self.position;
        while self.peek_char().is_some_and(|c| c != '\n') {
            self.advance();
        }
        TokenKind::Comment(self.source[body_start..self.position].trim().to_string())
    }

    /// Scans a string literal, splitting out `${...}` interpolations.
    fn scan_string(&mut self, start: usize, line: u32, column: u32) -> Result<TokenKind, LexError> {
        self.advance(); // consume opening '"'
        let mut segments = Vec::new();
        let mut text = String::new();
        loop {
            match self.peek_char() {
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => text.push(self.scan_escape()?),
                Some('$') if self.peek_char_n(1) == Some('{') => {
                    if !text.is_empty() {
                        segments.push(StringSegment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(self.scan_interpolation()?);
                }
                Some(c) => {
                    self.advance();
                    text.push(c);
                }
                None => {
                    return Err(LexError::UnterminatedString(
                        self.span_from(start, line, column),
                    ));
                }
            }
        }
        if !text.is_empty() || segments.is_empty() {
            segments.push(StringSegment::Text(text));
        }
        Ok(TokenKind::String(segments))
    }

    /// Scans one escape sequence, starting at the backslash.
    fn scan_escape(&mut self) -> Result<char, LexError> {
        let start = self.position;
        let line = self.line;
        let column = self.column;
        self.advance(); // consume '\'
        let escaped = match self.peek_char() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('0') => '\0',
            Some('\\') => '\\',
            Some('"') => '"',
            Some('\'') => '\'',
            Some('$') => '$',
            Some('u') => return self.scan_unicode_escape(start, line, column),
            Some(c) => {
                self.advance();
                return Err(LexError::InvalidEscape {
                    sequence: c.to_string(),
                    span: self.span_from(start, line, column),
                });
            }
            None => {
                return Err(LexError::UnterminatedString(
                    self.span_from(start, line, column),
                ));
            }
        };
        self.advance();
        Ok(escaped)
    }

    /// Scans `u{XXXX}` after a backslash.
    fn scan_unicode_escape(&mut self, start: usize, line: u32, column: u32) -> Result<char, LexError> {
        self.advance(); // consume 'u'
        let invalid = |lexer: &Self| LexError::InvalidEscape {
            sequence: lexer.source[start + 1..lexer.position].to_string(),
            span: lexer.span_from(start, line, column),
        };
        if self.peek_char() != Some('{') {
            return Err(invalid(self));
        }
        self.advance();
        let digits_start = self.position;
        while self.peek_char().is_some_and(|c| c.is_ascii_hexdigit()) {
            self.advance();
        }
        let digits = &self.source[digits_start..self.position];
        if self.peek_char() != Some('}') {
            return Err(invalid(self));
        }
        self.advance();
        u32::from_str_radix(digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| invalid(self))
    }

    /// Scans `${ ... }`, returning the inner source and its span.
    fn scan_interpolation(&mut self) -> Result<StringSegment, LexError> {
        let start = self.position;
        let line = self.line;
        let column = self.column;
        self.advance_by(2); // consume "${"

        let inner_start = self.position;
        let inner_line = self.line;
        let inner_column = self.column;
        let mut depth = 1usize;
        loop {
            match self.peek_char() {
                Some('{') => depth += 1,
                Some('}') => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                Some('"') => {
                    self.skip_nested_string();
                    continue;
                }
                Some(_) => {}
                None => {
                    return Err(LexError::UnterminatedInterpolation(
                        self.span_from(start, line, column),
                    ));
                }
            }
            self.advance();
        }

        let inner = self.source[inner_start..self.position].to_string();
        let span = Span::new(
            self.origin + inner_start,
            self.origin + self.position,
            inner_line,
            inner_column,
        );
        self.advance(); // consume closing '}'
        Ok(StringSegment::Interpolation(inner, span))
    }

    /// Skips a string literal nested inside an interpolation.
    fn skip_nested_string(&mut self) {
        self.advance();
        while let Some(c) = self.peek_char() {
            self.advance();
            match c {
                '\\' => self.advance(),
                '"' => return,
                _ => {}
            }
        }
    }

    /// Scans an integer or float literal.
    fn scan_number(&mut self, start: usize, line: u32, column: u32) -> Result<TokenKind, LexError> {
        let mut is_float = false;
        self.skip_digits();

        if self.peek_char() == Some('.') && self.peek_char_n(1).is_some_and(|c| c.is_ascii_digit())
        {
            is_float = true;
            self.advance();
            self.skip_digits();
        }

        if matches!(self.peek_char(), Some('e' | 'E')) {
            let exponent_digit = match self.peek_char_n(1) {
                Some('+' | '-') => self.peek_char_n(2),
                other => other,
            };
            if exponent_digit.is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.advance();
                if matches!(self.peek_char(), Some('+' | '-')) {
                    self.advance();
                }
                self.skip_digits();
            }
        }

        let text = &self.source[start..self.position];
        let invalid = || LexError::InvalidNumber {
            text: text.to_string(),
            span: self.span_from(start, line, column),
        };
        if is_float {
            text.parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(TokenKind::Float)
                .ok_or_else(invalid)
        } else {
            text.parse::<i64>()
                .map(TokenKind::Integer)
                .map_err(|_| invalid())
        }
    }

    fn skip_digits(&mut self) {
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    /// Scans an identifier, compound identifier, article, preposition or
    /// keyword literal.
    fn scan_word(&mut self) -> TokenKind {
        let start = self.position;
        let mut compound = false;
        self.skip_word_chars();
        while self.peek_char() == Some('-') && self.peek_char_n(1).is_some_and(is_word_char) {
            compound = true;
            self.advance();
            self.skip_word_chars();
        }

        let word = &self.source[start..self.position];
        if compound {
            return TokenKind::Compound(word.to_string());
        }
        if let Some(article) = Article::from_word(word) {
            return TokenKind::Article(article);
        }
        if let Some(prep) = Preposition::from_word(word) {
            return TokenKind::Preposition(prep);
        }
        match word {
            "true" => TokenKind::Boolean(true),
            "false" => TokenKind::Boolean(false),
            "null" => TokenKind::Null,
            _ => TokenKind::Identifier(word.to_string()),
        }
    }

    fn skip_word_chars(&mut self) {
        while self.peek_char().is_some_and(is_word_char) {
            self.advance();
        }
    }
}

/// Returns true if `c` can start an identifier.
fn is_word_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

/// Returns true if `c` can continue an identifier.
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
