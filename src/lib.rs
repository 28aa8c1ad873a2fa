//! FHIRPath implementation in Rust
//!
//! A complete engine for the HL7 FHIRPath expression language: byte-level
//! lexer, Pratt parser, immutable AST, tree-walking evaluator and the full
//! built-in function library. Inputs are arbitrary `serde_json` trees;
//! results are flat, ordered collections.
//!
//! ```no_run
//! use fhirpath_engine::FhirPathEngine;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), fhirpath_engine::FhirPathError> {
//! let engine = FhirPathEngine::new();
//! let patient = json!({
//!     "resourceType": "Patient",
//!     "name": [{"use": "official", "given": ["John"], "family": "Doe"}]
//! });
//!
//! let result = engine
//!     .evaluate("name.where(use = 'official').given.first()", &patient)
//!     .await?;
//! assert_eq!(result.to_json(), json!(["John"]));
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod model;
pub mod parser;
pub mod registry;
pub mod resolver;
pub mod terminology;

pub use engine::{CompiledExpression, FhirPathEngine};
pub use error::{FhirPathError, Result};
pub use evaluator::{
    AsyncMode, EnvValue, EnvironmentMap, EvaluationError, EvaluationOptions, Evaluator,
    HostCallable, UserFunction,
};
pub use model::{Collection, FhirPathValue, FhirResource, ModelTables, Quantity};
pub use parser::{ParseError, parse};
pub use registry::{FunctionFamily, FunctionMeta, FunctionRegistry};
pub use resolver::ReferenceResolver;
pub use terminology::{Coded, HttpTerminologyService, TerminologyService};
