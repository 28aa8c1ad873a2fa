//! Top-level error type for the FHIRPath engine
//!
//! Three error kinds surface to callers: lexical errors (malformed tokens),
//! parse errors (unexpected token / missing close bracket) and evaluation
//! errors (type mismatches, singleton violations, regex failures). Lexical
//! and parse errors carry the offending source position; evaluation errors
//! carry one when the failing node had a recorded span.

use thiserror::Error;

use crate::evaluator::EvaluationError;
use crate::parser::ParseError;

/// Result type used by the engine facade
pub type Result<T> = std::result::Result<T, FhirPathError>;

/// Errors surfaced by `parse`, `compile` and `evaluate`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FhirPathError {
    /// Malformed token: unterminated string/identifier/comment or an unknown character
    #[error("Lexical error at line {line}, column {column}: {message}")]
    Lexical {
        /// Human-readable description
        message: String,
        /// 1-based line of the offending character
        line: u32,
        /// 1-based column of the offending character
        column: u32,
    },

    /// Unexpected token or premature end of input
    #[error("Parse error at line {line}, column {column}: {message}")]
    Parse {
        /// Human-readable description
        message: String,
        /// 1-based line of the offending token
        line: u32,
        /// 1-based column of the offending token
        column: u32,
    },

    /// Runtime failure that halts the evaluation (never converted to empty)
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),
}

impl FhirPathError {
    /// The 1-based source line, when known
    pub fn line(&self) -> Option<u32> {
        match self {
            Self::Lexical { line, .. } | Self::Parse { line, .. } => Some(*line),
            Self::Evaluation(_) => None,
        }
    }

    /// The 1-based source column, when known
    pub fn column(&self) -> Option<u32> {
        match self {
            Self::Lexical { column, .. } | Self::Parse { column, .. } => Some(*column),
            Self::Evaluation(_) => None,
        }
    }
}

impl From<ParseError> for FhirPathError {
    fn from(err: ParseError) -> Self {
        let (line, column) = err.position();
        if err.is_lexical() {
            Self::Lexical {
                message: err.to_string(),
                line,
                column,
            }
        } else {
            Self::Parse {
                message: err.to_string(),
                line,
                column,
            }
        }
    }
}
