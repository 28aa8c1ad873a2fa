//! FHIRPath expression parser
//!
//! A byte-level tokenizer feeds a Pratt parser that climbs the operator
//! precedence ladder and produces the AST in `crate::ast`.

#![warn(missing_docs)]

pub mod error;
pub mod pratt;
pub mod span;
pub mod tokenizer;

pub use error::{ParseError, ParseResult};
pub use pratt::{Parser, parse_expression};
pub use span::Spanned;
pub use tokenizer::{Token, Tokenizer, tokenize};

/// Parse an FHIRPath expression string into an AST
pub fn parse(input: &str) -> ParseResult<crate::ast::ExpressionNode> {
    parse_expression(input)
}
