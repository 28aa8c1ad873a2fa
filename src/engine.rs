//! The engine facade: expression caching and the public
//! parse / compile / evaluate API
//!
//! The engine is long-lived and shareable. It owns an LRU cache keyed by
//! the raw expression string; parsed ASTs come out behind an `Arc`, so
//! concurrent evaluations share them freely. Each evaluation gets a fresh
//! context frame seeded with `%resource`, `%rootResource`, `%context`,
//! `%ucum` and, when a terminology service is configured,
//! `%terminologies`.

use std::num::NonZeroUsize;
use std::sync::Arc;

use log::debug;
use lru::LruCache;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::ast::ExpressionNode;
use crate::error::Result;
use crate::evaluator::context::{EnvValue, EnvironmentMap, EvaluationContext};
use crate::evaluator::engine::Evaluator;
use crate::evaluator::options::EvaluationOptions;
use crate::model::{Collection, FhirPathValue};
use crate::parser::parse_expression;
use crate::registry::FunctionRegistry;
use crate::terminology::{HttpTerminologyService, TerminologiesProxy};

/// Default LRU capacity for the expression cache
const DEFAULT_CACHE_SIZE: usize = 1000;

/// Canonical UCUM system URL bound as `%ucum`
const UCUM_SYSTEM: &str = "http://unitsofmeasure.org";

/// Main FHIRPath engine: parse, compile and evaluate expressions
pub struct FhirPathEngine {
    registry: Arc<FunctionRegistry>,
    options: Arc<EvaluationOptions>,
    cache: Mutex<LruCache<String, Arc<ExpressionNode>>>,
}

impl Default for FhirPathEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FhirPathEngine {
    /// Create an engine with default options
    pub fn new() -> Self {
        Self::with_options(EvaluationOptions::default())
    }

    /// Create an engine with the given options bundle
    pub fn with_options(options: EvaluationOptions) -> Self {
        Self::with_options_and_cache_size(options, DEFAULT_CACHE_SIZE)
    }

    /// Create an engine with an explicit expression-cache capacity
    pub fn with_options_and_cache_size(options: EvaluationOptions, cache_size: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_size.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            registry: Arc::new(FunctionRegistry::standard()),
            options: Arc::new(options),
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Compose a default HTTP terminology client for `url` and attach it
    /// to the options, honoring per-server extra headers
    pub fn with_terminology_url(
        mut options: EvaluationOptions,
        url: &str,
        http_headers: FxHashMap<String, FxHashMap<String, String>>,
    ) -> EvaluationOptions {
        options.terminology = Some(Arc::new(HttpTerminologyService::new(url, http_headers)));
        options
    }

    /// The options bundle this engine evaluates with
    pub fn options(&self) -> &EvaluationOptions {
        &self.options
    }

    /// The built-in function registry (static tables for tooling)
    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Parse an expression, using the cache. The returned AST is shared
    /// and immutable; tooling may inspect it without evaluating.
    pub fn parse(&self, expression: &str) -> Result<Arc<ExpressionNode>> {
        if let Some(ast) = self.cache.lock().get(expression) {
            debug!("expression cache hit: {expression}");
            return Ok(Arc::clone(ast));
        }
        // Parsing is idempotent, so a lost race merely re-parses
        let ast = Arc::new(parse_expression(expression)?);
        self.cache
            .lock()
            .put(expression.to_string(), Arc::clone(&ast));
        Ok(ast)
    }

    /// Compile an expression into a reusable callable. The optional `base`
    /// records the type context the expression was written against.
    pub fn compile(&self, expression: &str, base: Option<&str>) -> Result<CompiledExpression> {
        let ast = self.parse(expression)?;
        Ok(CompiledExpression {
            ast,
            base: base.map(str::to_string),
            registry: Arc::clone(&self.registry),
            options: Arc::clone(&self.options),
        })
    }

    /// Evaluate an expression against a JSON input document
    pub async fn evaluate(&self, expression: &str, input: &Value) -> Result<Collection> {
        self.evaluate_with_environment(expression, input, EnvironmentMap::default())
            .await
    }

    /// Evaluate with caller-supplied environment variables merged over the
    /// conventional ones
    pub async fn evaluate_with_environment(
        &self,
        expression: &str,
        input: &Value,
        environment: EnvironmentMap,
    ) -> Result<Collection> {
        let ast = self.parse(expression)?;
        let input_collection = Collection::from_json(input);
        let env = build_environment(&self.options, &input_collection, environment);
        let evaluator = Evaluator::new(Arc::clone(&self.registry), Arc::clone(&self.options));
        let mut ctx = EvaluationContext::new(input_collection, env);
        Ok(evaluator.evaluate(&ast, &mut ctx).await?)
    }

    /// Evaluate and render the result collection as a JSON array
    pub async fn evaluate_to_json(&self, expression: &str, input: &Value) -> Result<Value> {
        Ok(self.evaluate(expression, input).await?.to_json())
    }
}

/// A compiled expression: a shared AST plus the engine configuration it
/// was compiled under, callable any number of times
#[derive(Clone)]
pub struct CompiledExpression {
    ast: Arc<ExpressionNode>,
    base: Option<String>,
    registry: Arc<FunctionRegistry>,
    options: Arc<EvaluationOptions>,
}

impl CompiledExpression {
    /// The parsed AST
    pub fn ast(&self) -> &ExpressionNode {
        &self.ast
    }

    /// The base type tag given at compile time, when any
    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    /// Evaluate against a JSON input document
    pub async fn evaluate(&self, input: &Value) -> Result<Collection> {
        self.evaluate_with_environment(input, EnvironmentMap::default())
            .await
    }

    /// Evaluate with caller-supplied environment variables
    pub async fn evaluate_with_environment(
        &self,
        input: &Value,
        environment: EnvironmentMap,
    ) -> Result<Collection> {
        let input_collection = Collection::from_json(input);
        let env = build_environment(&self.options, &input_collection, environment);
        let evaluator = Evaluator::new(Arc::clone(&self.registry), Arc::clone(&self.options));
        let mut ctx = EvaluationContext::new(input_collection, env);
        Ok(evaluator.evaluate(&self.ast, &mut ctx).await?)
    }
}

/// Seed the conventional environment entries, letting caller entries win
fn build_environment(
    options: &Arc<EvaluationOptions>,
    input: &Collection,
    extra: EnvironmentMap,
) -> Arc<EnvironmentMap> {
    let mut env = EnvironmentMap::default();
    env.insert("resource".to_string(), EnvValue::value(input.clone()));
    env.insert("rootResource".to_string(), EnvValue::value(input.clone()));
    env.insert("context".to_string(), EnvValue::value(input.clone()));
    env.insert(
        "ucum".to_string(),
        EnvValue::item(FhirPathValue::String(UCUM_SYSTEM.to_string())),
    );
    if let Some(service) = &options.terminology {
        env.insert(
            "terminologies".to_string(),
            EnvValue::Host(Arc::new(TerminologiesProxy::new(Arc::clone(service)))),
        );
    }
    for (name, value) in extra {
        env.insert(name, value);
    }
    Arc::new(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FhirPathError;
    use serde_json::json;

    #[tokio::test]
    async fn test_parse_cache_reuses_ast() {
        let engine = FhirPathEngine::new();
        let a = engine.parse("name.given").unwrap();
        let b = engine.parse("name.given").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_cache_eviction() {
        let engine =
            FhirPathEngine::with_options_and_cache_size(EvaluationOptions::default(), 2);
        let first = engine.parse("a").unwrap();
        engine.parse("b").unwrap();
        engine.parse("c").unwrap(); // evicts "a"
        let re_parsed = engine.parse("a").unwrap();
        assert!(!Arc::ptr_eq(&first, &re_parsed));
    }

    #[tokio::test]
    async fn test_parse_error_surfaces_position() {
        let engine = FhirPathEngine::new();
        let err = engine.parse("1 +").unwrap_err();
        assert!(matches!(err, FhirPathError::Parse { .. }));
        let err = engine.parse("'unterminated").unwrap_err();
        assert!(matches!(err, FhirPathError::Lexical { .. }));
    }

    #[tokio::test]
    async fn test_compile_and_reuse() {
        let engine = FhirPathEngine::new();
        let compiled = engine.compile("name.given.count()", Some("Patient")).unwrap();
        assert_eq!(compiled.base(), Some("Patient"));

        let input = json!({"name": [{"given": ["A", "B"]}]});
        let result = compiled.evaluate(&input).await.unwrap();
        assert_eq!(result.singleton(), Some(&FhirPathValue::Integer(2)));

        let other = json!({"name": [{"given": ["C"]}]});
        let result = compiled.evaluate(&other).await.unwrap();
        assert_eq!(result.singleton(), Some(&FhirPathValue::Integer(1)));
    }
}
