//! Tarn front end.
//!
//! - [`parse`]: tokens to a [`SyntaxTree`](tarn_ir::SyntaxTree)
//! - [`build_ast`]: syntax tree to a validated [`AstRoot`](tarn_ir::AstRoot)
//!   with its top-level declaration table
//!
//! Both stages work on one file at a time and never look at other files or
//! packages; cross-file resolution belongs to the loader.

mod ast_builder;
mod error;
mod lexer;
mod parser;

pub use ast_builder::build_ast;
pub use error::{AstError, AstErrorKind, ParseError};
pub use lexer::{lex, Token, TokenKind};
pub use parser::parse;
