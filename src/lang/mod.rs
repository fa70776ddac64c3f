/*!
# Language Module

Lexical analysis, expression compilation, and statement classification.

*/

#[macro_use]
mod error;
mod ast;
mod expr;
mod lex;
mod parse;
mod token;

pub use ast::{BinOp, ExprNode, UnaryOp};
pub use error::Error;
pub use error::ErrorCode;
pub use expr::compile;
pub use lex::tokenize;
pub use parse::{classify, is_keyword, PrintItem, Stmt, Target};
pub use token::{Operator, Token};

/// Program line numbers. Explicit numbers and the synthetic numbers
/// assigned to labels and unnumbered statements share this space.
pub type LineNumber = u32;
