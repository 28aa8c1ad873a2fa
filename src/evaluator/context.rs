//! Evaluation context for FHIRPath expressions
//!
//! One context frame exists per evaluation. Sub-evaluations (`where`,
//! `select`, `aggregate`, ...) derive child frames that rebind the current
//! collection, `$this`, `$index` and `$total`; the parent frame is never
//! mutated by a child, which gives the save/restore discipline for free.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::error::EvaluationResult;
use crate::model::{Collection, FhirPathValue};

/// A host object reachable through an environment variable whose methods
/// can be invoked from expressions (`%terminologies.expand(...)`)
#[async_trait]
pub trait HostCallable: Send + Sync {
    /// Invoke a method with eagerly evaluated arguments
    async fn invoke(&self, method: &str, args: &[Collection]) -> EvaluationResult<Collection>;
}

/// A value bound in the `%`-environment: plain data or a host object
#[derive(Clone)]
pub enum EnvValue {
    /// Ordinary collection value
    Value(Collection),
    /// Host object dispatched by method name
    Host(Arc<dyn HostCallable>),
}

impl EnvValue {
    /// Wrap a collection
    pub fn value(collection: Collection) -> Self {
        Self::Value(collection)
    }

    /// Wrap a single item
    pub fn item(item: FhirPathValue) -> Self {
        Self::Value(Collection::singleton_of(item))
    }
}

/// Map of environment variables available as `%name`
pub type EnvironmentMap = FxHashMap<String, EnvValue>;

/// Variable scope chain for `defineVariable`
#[derive(Clone, Debug, Default)]
pub struct VariableScope {
    variables: FxHashMap<String, Collection>,
    parent: Option<Arc<VariableScope>>,
}

impl VariableScope {
    /// Create a new root scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a child scope inheriting from `parent`
    pub fn child(parent: &VariableScope) -> Self {
        Self {
            variables: FxHashMap::default(),
            parent: Some(Arc::new(parent.clone())),
        }
    }

    /// Define a variable in this scope, shadowing any parent binding
    pub fn set_variable(&mut self, name: String, value: Collection) {
        self.variables.insert(name, value);
    }

    /// Look a variable up through the scope chain
    pub fn get_variable(&self, name: &str) -> Option<&Collection> {
        if let Some(value) = self.variables.get(name) {
            return Some(value);
        }
        self.parent
            .as_ref()
            .and_then(|parent| parent.get_variable(name))
    }

    /// Whether the chain binds `name` anywhere
    pub fn contains(&self, name: &str) -> bool {
        self.get_variable(name).is_some()
    }
}

/// Per-evaluation state threaded through the tree walker
#[derive(Clone)]
pub struct EvaluationContext {
    /// The current collection, the implicit receiver
    pub input: Collection,
    /// The root input of the evaluation
    pub root: Collection,
    /// Variables defined by `defineVariable`
    pub variables: VariableScope,
    /// `%`-environment, shared and read-only during evaluation
    pub environment: Arc<EnvironmentMap>,
    /// Binding for `$this`
    pub this: Collection,
    /// Binding for `$index`, set only inside iterating functions
    pub index: Option<i64>,
    /// Binding for `$total`, set only inside `aggregate`
    pub total: Option<Collection>,
}

impl EvaluationContext {
    /// Create the top-level frame for an evaluation
    pub fn new(input: Collection, environment: Arc<EnvironmentMap>) -> Self {
        Self {
            root: input.clone(),
            this: input.clone(),
            input,
            variables: VariableScope::new(),
            environment,
            index: None,
            total: None,
        }
    }

    /// Derive a frame with a different current collection
    pub fn with_input(&self, input: Collection) -> Self {
        Self {
            input,
            root: self.root.clone(),
            variables: self.variables.clone(),
            environment: Arc::clone(&self.environment),
            this: self.this.clone(),
            index: self.index,
            total: self.total.clone(),
        }
    }

    /// Derive a per-item frame for an iterating function, rebinding the
    /// current collection, `$this` and `$index`
    pub fn with_item(&self, item: &FhirPathValue, index: usize) -> Self {
        let singleton = Collection::singleton_of(item.clone());
        Self {
            input: singleton.clone(),
            root: self.root.clone(),
            variables: VariableScope::child(&self.variables),
            environment: Arc::clone(&self.environment),
            this: singleton,
            index: Some(index as i64),
            total: self.total.clone(),
        }
    }

    /// Look up an environment value
    pub fn env_value(&self, name: &str) -> Option<&EnvValue> {
        self.environment.get(name)
    }
}
