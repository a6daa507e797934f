//! Lexer, parser, pretty-printer and semantic analyzer for ARO.
//!
//! This crate provides:
//! - [`Lexer`] - Tokenization of ARO source
//! - [`Parser`] - Parsing tokens into a [`Program`]
//! - [`pretty`] - Canonical source rendering
//! - [`contract`] - Action roles and preposition sets
//! - [`analyzer`] - Scoping, immutability and preposition checks

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod analyzer;
pub mod ast;
pub mod contract;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod pretty;
pub mod span;
pub mod token;

pub use analyzer::{Analysis, AnalyzerConfig, Diagnostic, DiagnosticKind, Severity, analyze};
pub use ast::{
    AroStatement, Block, Expr, FeatureSet, Literal, ObjectDescriptor, Program, QualifiedNoun,
    ResultDescriptor, Statement,
};
pub use contract::{ActionContract, ActionRole, ContractLookup, ContractTable};
pub use error::{LexError, ParseError, SyntaxErrors};
pub use lexer::Lexer;
pub use parser::{Parser, parse_expression, parse_program};
pub use span::Span;
pub use token::{Article, Preposition, Token, TokenKind};
