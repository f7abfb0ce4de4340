//! C source code front end
//!
//! This module transforms C source text into an Abstract Syntax Tree (AST)
//! whose nodes carry exact byte spans, and resolves variable references:
//! - [`lexer`]: Tokenization (source text → tokens)
//! - [`parse`]: Parsing (tokens → AST), split across `declarations`,
//!   `statements` and `expressions`
//! - [`ast`]: AST node definitions
//! - [`resolve`]: Name resolution and expression types
//!
//! # Supported C Subset
//!
//! - Types: `int`, `char`, `short`, `long`, `float`, `double`, `bool`, `void`,
//!   `unsigned`/`signed`, structs, pointers, arrays
//! - Top level: struct definitions, function definitions and prototypes,
//!   global variables with `static`/`extern`
//! - Statements: declarations, control flow (`if`, `while`, `do`, `for`,
//!   `switch`), `goto` and labels
//! - Expressions: arithmetic, logical, bitwise, ternary, comma, casts, calls
//! - Preprocessor lines are skipped
//! - No typedefs, unions, enums, or function pointers
//!
//! # Parser Implementation
//!
//! Hand-written recursive descent parser with precedence climbing for binary operators.
//! No external parser generator dependencies.

pub mod ast;
mod declarations;
mod expressions;
pub mod lexer;
pub mod parse;
pub mod resolve;
mod statements;

pub use parse::{parse_source, ParseError, Parser};

use ast::Program;

/// A parsed translation unit together with the text it was parsed from.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    /// Display name, usually the file path.
    pub name: String,
    pub source: String,
    pub program: Program,
}

impl SourceUnit {
    pub fn parse(name: impl Into<String>, source: impl Into<String>) -> Result<Self, ParseError> {
        let source = source.into();
        let program = parse_source(&source)?;
        Ok(Self {
            name: name.into(),
            source,
            program,
        })
    }

    /// Source text covered by `span`.
    pub fn text(&self, span: ast::Span) -> &str {
        &self.source[span.start..span.end]
    }
}
