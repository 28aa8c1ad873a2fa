//! The options bundle consulted during evaluation
//!
//! All fields are read-only once an evaluation starts. The bundle carries
//! the optional model tables, user-defined functions, the trace sink, the
//! terminology and resolver services, the async gate and the abort flag.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{FixedOffset, Utc};
use rustc_hash::FxHashMap;

use super::error::{EvaluationError, EvaluationResult};
use crate::model::{Collection, ModelTables};
use crate::resolver::ReferenceResolver;
use crate::terminology::TerminologyService;

/// Whether operations that suspend (terminology, resolver) are permitted
///
/// With `Off`, reaching `resolve()`, `memberOf()` or a `%terminologies`
/// method is an evaluation error. `On` and `Always` both permit them; every
/// evaluation is uniformly a future in this implementation, so the two only
/// differ in caller intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AsyncMode {
    /// Suspending operations are an error
    #[default]
    Off,
    /// Suspending operations are permitted
    On,
    /// Suspending operations are permitted; result is always treated as async
    Always,
}

impl AsyncMode {
    /// Whether suspending operations may run
    pub fn allows_suspension(&self) -> bool {
        !matches!(self, AsyncMode::Off)
    }
}

/// Trace sink invoked by `trace(label [, projection])`
pub type TraceFn = dyn Fn(&str, &Collection) + Send + Sync;

/// Predicate used by type operators to treat profile-to-base relationships
/// as type matches
pub type DerivedResourceFn = dyn Fn(&str, &str) -> bool + Send + Sync;

/// Implementation signature for user-supplied functions: the current
/// collection plus eagerly evaluated arguments
pub type UserFnImpl =
    dyn Fn(&Collection, &[Collection]) -> EvaluationResult<Collection> + Send + Sync;

/// A user-supplied function entry, consulted before the built-ins
#[derive(Clone)]
pub struct UserFunction {
    /// Accepted argument counts
    pub arity: RangeInclusive<usize>,
    /// When false, an empty input collection short-circuits to empty
    /// without invoking the implementation
    pub nullable: bool,
    /// The implementation
    pub implementation: Arc<UserFnImpl>,
}

impl UserFunction {
    /// Create an entry with a fixed arity
    pub fn new(
        arity: RangeInclusive<usize>,
        nullable: bool,
        implementation: impl Fn(&Collection, &[Collection]) -> EvaluationResult<Collection>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            arity,
            nullable,
            implementation: Arc::new(implementation),
        }
    }
}

/// Immutable options consulted by the evaluator
#[derive(Clone, Default)]
pub struct EvaluationOptions {
    /// FHIR model tables for type-operator widening
    pub model: Option<Arc<ModelTables>>,
    /// User-defined functions, checked before built-ins
    pub user_functions: FxHashMap<String, UserFunction>,
    /// Sink for `trace()`
    pub trace: Option<Arc<TraceFn>>,
    /// Extra profile-derivation predicate for type operators
    pub is_derived_resource: Option<Arc<DerivedResourceFn>>,
    /// Terminology service behind `memberOf()` and `%terminologies`
    pub terminology: Option<Arc<dyn TerminologyService>>,
    /// Resolver behind `resolve()`
    pub resolver: Option<Arc<dyn ReferenceResolver>>,
    /// Async gate for suspending operations
    pub async_mode: AsyncMode,
    /// Cooperative abort flag, checked between iteration steps
    pub signal: Option<Arc<AtomicBool>>,
    /// Fixed clock for `now()` / `today()` / `timeOfDay()`, the test seam
    pub fixed_now: Option<chrono::DateTime<FixedOffset>>,
}

impl EvaluationOptions {
    /// Fresh options with everything defaulted
    pub fn new() -> Self {
        Self::default()
    }

    /// Return an error if the abort signal has been raised
    pub fn check_abort(&self) -> EvaluationResult<()> {
        match &self.signal {
            Some(signal) if signal.load(Ordering::Relaxed) => Err(EvaluationError::Aborted),
            _ => Ok(()),
        }
    }

    /// The wall clock, or the injected fixed instant
    pub fn now(&self) -> chrono::DateTime<FixedOffset> {
        self.fixed_now
            .unwrap_or_else(|| Utc::now().fixed_offset())
    }

    /// Error unless async mode permits the named suspending operation
    pub fn require_async(&self, operation: &str) -> EvaluationResult<()> {
        if self.async_mode.allows_suspension() {
            Ok(())
        } else {
            Err(EvaluationError::AsyncDisabled {
                operation: operation.to_string(),
            })
        }
    }
}
