//! Token types for the ARO language.
//!
//! Tokens are the output of the lexer and input to the parser.

use std::fmt;

use crate::span::Span;

/// A token from lexical analysis.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    /// The type and value of this token.
    pub kind: TokenKind,
    /// The exact source text of this token.
    pub lexeme: String,
    /// Source location of this token.
    pub span: Span,
}

impl Token {
    /// Creates a new token.
    #[must_use]
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            span,
        }
    }

    /// Returns the text of word-like tokens (identifiers, compounds,
    /// articles and prepositions).
    #[must_use]
    pub fn word(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Identifier(name) | TokenKind::Compound(name) => Some(name),
            TokenKind::Article(article) => Some(article.as_str()),
            TokenKind::Preposition(prep) => Some(prep.as_str()),
            _ => None,
        }
    }

    /// Returns true if this token is the identifier `keyword`.
    #[must_use]
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(&self.kind, TokenKind::Identifier(name) if name == keyword)
    }

    /// Returns true if this token is trivia the parser skips.
    #[must_use]
    pub const fn is_comment(&self) -> bool {
        matches!(self.kind, TokenKind::Comment(_))
    }
}

/// Token types for the ARO language.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    // Words
    /// Plain identifier like `user` or `Extract`.
    Identifier(String),
    /// Hyphen-joined identifier like `user-repository`.
    Compound(String),
    /// One of the three articles.
    Article(Article),
    /// One of the ten reserved prepositions.
    Preposition(Preposition),

    // Delimiters
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `<`
    LAngle,
    /// `>`
    RAngle,
    /// `:`
    Colon,
    /// `.`
    Dot,
    /// `,`
    Comma,
    /// `;`
    Semicolon,

    // Operators
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `++`
    Concat,
    /// `<=`
    LessEqual,
    /// `>=`
    GreaterEqual,
    /// `==`
    EqualEqual,
    /// `!=`
    NotEqual,
    /// `=`
    Equal,

    // Literals
    /// String literal, split into text and `${...}` segments.
    String(Vec<StringSegment>),
    /// Integer literal.
    Integer(i64),
    /// Float literal.
    Float(f64),
    /// `true` or `false`.
    Boolean(bool),
    /// `null`
    Null,

    /// Block `(* ... *)` or line `// ...` comment.
    Comment(String),
    /// End of input.
    Eof,
}

impl TokenKind {
    /// Describes this kind of token for diagnostics.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Identifier(name) | Self::Compound(name) => format!("identifier '{name}'"),
            Self::Article(article) => format!("article '{article}'"),
            Self::Preposition(prep) => format!("preposition '{prep}'"),
            Self::String(_) => "string literal".to_string(),
            Self::Integer(n) => format!("integer {n}"),
            Self::Float(n) => format!("float {n}"),
            Self::Boolean(b) => format!("'{b}'"),
            Self::Null => "'null'".to_string(),
            Self::Comment(_) => "comment".to_string(),
            Self::Eof => "end of input".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    /// Returns the fixed spelling of punctuation and operator tokens.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::LAngle => "<",
            Self::RAngle => ">",
            Self::Colon => ":",
            Self::Dot => ".",
            Self::Comma => ",",
            Self::Semicolon => ";",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Concat => "++",
            Self::LessEqual => "<=",
            Self::GreaterEqual => ">=",
            Self::EqualEqual => "==",
            Self::NotEqual => "!=",
            Self::Equal => "=",
            _ => "",
        }
    }
}

/// A piece of a string literal.
#[derive(Clone, Debug, PartialEq)]
pub enum StringSegment {
    /// Literal text with escapes already resolved.
    Text(String),
    /// Source of a `${...}` interpolation and the span of that source.
    Interpolation(String, Span),
}

/// The three reserved articles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Article {
    /// `a`
    A,
    /// `an`
    An,
    /// `the`
    The,
}

impl Article {
    /// Recognizes an article.
    #[must_use]
    pub fn from_word(word: &str) -> Option<Self> {
        match word {
            "a" => Some(Self::A),
            "an" => Some(Self::An),
            "the" => Some(Self::The),
            _ => None,
        }
    }

    /// Returns the spelling of this article.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "a",
            Self::An => "an",
            Self::The => "the",
        }
    }
}

impl fmt::Display for Article {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The ten reserved prepositions.
///
/// Each carries a fixed meaning that actions rely on when interpreting
/// their object clause.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Preposition {
    /// `from`: the source of data.
    From,
    /// `for`: the purpose or beneficiary.
    For,
    /// `against`: the reference a value is checked against.
    Against,
    /// `to`: the destination.
    To,
    /// `into`: the target of a transformation or storage.
    Into,
    /// `via`: the channel or intermediary.
    Via,
    /// `with`: accompanying data.
    With,
    /// `on`: the location or trigger.
    On,
    /// `at`: a point such as a port or position.
    At,
    /// `by`: the criterion or agent.
    By,
}

impl Preposition {
    /// Every preposition, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::From,
        Self::For,
        Self::Against,
        Self::To,
        Self::Into,
        Self::Via,
        Self::With,
        Self::On,
        Self::At,
        Self::By,
    ];

    /// Recognizes a preposition.
    #[must_use]
    pub fn from_word(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == word)
    }

    /// Returns the spelling of this preposition.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::From => "from",
            Self::For => "for",
            Self::Against => "against",
            Self::To => "to",
            Self::Into => "into",
            Self::Via => "via",
            Self::With => "with",
            Self::On => "on",
            Self::At => "at",
            Self::By => "by",
        }
    }

    /// Returns the semantic role this preposition gives an object.
    #[must_use]
    pub const fn meaning(self) -> &'static str {
        match self {
            Self::From => "source",
            Self::For => "purpose",
            Self::Against => "reference",
            Self::To => "destination",
            Self::Into => "transformation target",
            Self::Via => "channel",
            Self::With => "accompaniment",
            Self::On => "location",
            Self::At => "point",
            Self::By => "criterion",
        }
    }
}

impl fmt::Display for Preposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
