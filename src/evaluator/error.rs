//! Error types for FHIRPath evaluation
//!
//! Only hard failures become errors: type mismatches on required single
//! values, `single()` on more than one item, regex compile failures, and
//! async-gated operations used without async mode. Soft failures (divide by
//! zero, missing properties, failed conversions, out-of-range indexing)
//! yield empty collections instead; FHIRPath is empty-propagating.

use thiserror::Error;

/// Result type for evaluation operations
pub type EvaluationResult<T> = Result<T, EvaluationError>;

/// Errors that halt an evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    /// A value of one type appeared where another was required
    #[error("type error: expected {expected}, got {actual}")]
    TypeError {
        /// Expected type or shape
        expected: String,
        /// Actual type found
        actual: String,
    },

    /// An operation required a single value but the collection had more
    #[error("{function} requires a single value, got {size} items")]
    SingletonRequired {
        /// The operation
        function: String,
        /// Number of items found
        size: usize,
    },

    /// Wrong number of arguments for a function
    #[error("{function} expects {expected} argument(s), got {actual}")]
    InvalidArgumentCount {
        /// Function name
        function: String,
        /// Expected arity description
        expected: String,
        /// Actual argument count
        actual: usize,
    },

    /// An argument had the wrong type or shape
    #[error("invalid argument to {function}: {message}")]
    InvalidArgument {
        /// Function name
        function: String,
        /// What was wrong
        message: String,
    },

    /// A function name with no built-in or user-supplied implementation
    #[error("unknown function: {name}")]
    UnknownFunction {
        /// The name as written
        name: String,
    },

    /// A regular expression failed to compile
    #[error("invalid regular expression: {message}")]
    InvalidRegex {
        /// Compiler message
        message: String,
    },

    /// An async-only operation was used while async mode is off
    #[error("{operation} requires async mode")]
    AsyncDisabled {
        /// The operation (`memberOf`, `resolve`, a `%terminologies` method)
        operation: String,
    },

    /// An iterating operation exceeded its pass limit
    #[error("{function} exceeded {limit} iterations")]
    IterationLimit {
        /// Function name
        function: String,
        /// The configured cap
        limit: usize,
    },

    /// The abort signal was raised
    #[error("evaluation aborted")]
    Aborted,

    /// A service (terminology, resolver) reported a failure
    #[error("service error: {message}")]
    Service {
        /// Service-reported message
        message: String,
    },

    /// Any other invalid operation
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Error message
        message: String,
    },
}

impl EvaluationError {
    /// Convenience constructor for type errors
    pub fn type_error(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeError {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Convenience constructor for invalid operations
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}
