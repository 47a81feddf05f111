//! Java syntax trees for the inline refactoring engine.
//!
//! The tree is a mutable arena ([`Tree`]) shared by every file of a project,
//! so that refactorings can move subtrees between files without re-parsing.
//! [`parse_java_file`] builds it from source text and [`print_file`] renders
//! it back in a canonical layout.

mod kind;
mod lexer;
pub mod make;
mod order;
mod parser;
mod printer;
mod tree;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use kind::{
    AssignOp, BinaryOp, ClassData, ClassKind, LiteralKind, MethodData, Modifiers, NodeKind,
    UnaryOp, VarData, Visibility,
};
pub use lexer::{lex, Token, TokenKind};
pub use order::DocumentOrder;
pub use parser::{is_primitive_type, parse_expression, parse_java_file, parse_statement};
pub use printer::{print_file, print_node};
pub use text_size::{TextRange, TextSize};
pub use tree::{Ancestors, FileContent, FileId, Node, NodeId, SourceFile, Tree, TreeError};

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message} at {range:?}")]
pub struct ParseError {
    pub message: String,
    pub range: TextRange,
}

#[cfg(test)]
mod tests;
