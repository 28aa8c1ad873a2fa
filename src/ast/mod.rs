//! Abstract Syntax Tree (AST) definitions for FHIRPath expressions
//!
//! The AST is a closed sum type produced by the parser. Nodes are immutable
//! after construction and are shared across concurrent evaluations behind an
//! `Arc` by the engine's expression cache.

#![warn(missing_docs)]

mod expression;
mod operator;

pub use expression::*;
pub use operator::*;
