//! FHIRPath expression evaluator
//!
//! A single-threaded cooperative tree walker per evaluation. Multiple
//! evaluations may run in parallel on separate contexts because the AST is
//! immutable and the registry and options are read-only after construction.

pub mod context;
pub mod engine;
pub mod error;
pub mod operators;
pub mod options;

pub use context::{EnvValue, EnvironmentMap, EvaluationContext, HostCallable, VariableScope};
pub use engine::Evaluator;
pub use error::{EvaluationError, EvaluationResult};
pub use options::{AsyncMode, EvaluationOptions, UserFunction};
