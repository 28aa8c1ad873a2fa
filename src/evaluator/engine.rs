//! The FHIRPath tree-walking evaluator
//!
//! A post-order walker over the AST. Recursion goes through `BoxFuture`
//! because `resolve()`, `memberOf()` and `%terminologies` methods may
//! suspend; every other node completes synchronously inside the future.
//! The abort flag is checked at the top of every node evaluation.

use futures::future::BoxFuture;
use log::trace;
use std::sync::Arc;

use super::context::{EnvValue, EvaluationContext};
use super::error::{EvaluationError, EvaluationResult};
use super::operators;
use super::options::EvaluationOptions;
use crate::ast::{BinaryOperator, ExpressionNode, LiteralValue, TypeSpecifier};
use crate::model::{Collection, Date, DateTime, FhirPathValue, Quantity, Time};
use crate::model::value::parse_decimal;
use crate::registry::{self, FunctionRegistry};

/// Tree-walking evaluator bound to a function registry and an options bundle
#[derive(Clone)]
pub struct Evaluator {
    registry: Arc<FunctionRegistry>,
    options: Arc<EvaluationOptions>,
}

impl Evaluator {
    /// Create an evaluator
    pub fn new(registry: Arc<FunctionRegistry>, options: Arc<EvaluationOptions>) -> Self {
        Self { registry, options }
    }

    /// The options bundle
    pub fn options(&self) -> &EvaluationOptions {
        &self.options
    }

    /// The function registry
    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Evaluate a node against the context, producing a flat collection
    pub fn evaluate<'a>(
        &'a self,
        node: &'a ExpressionNode,
        ctx: &'a mut EvaluationContext,
    ) -> BoxFuture<'a, EvaluationResult<Collection>> {
        Box::pin(async move {
            self.options.check_abort()?;
            match node {
                ExpressionNode::Literal(literal) => self.evaluate_literal(literal),

                ExpressionNode::Identifier(name) => Ok(self.evaluate_identifier(name, ctx)),

                ExpressionNode::Path { base, path } => {
                    let base_value = self.evaluate(base, ctx).await?;
                    // defineVariable bindings shadow member navigation,
                    // including bindings introduced while evaluating the base
                    if let Some(value) = ctx.variables.get_variable(path) {
                        return Ok(value.clone());
                    }
                    Ok(navigate(&base_value, path))
                }

                ExpressionNode::Paren(inner) => self.evaluate(inner, ctx).await,

                ExpressionNode::EmptyCollection => Ok(Collection::empty()),

                ExpressionNode::Variable(name) => Ok(self.evaluate_variable(name, ctx)),

                ExpressionNode::EnvironmentVariable(name) => {
                    Ok(self.evaluate_environment_variable(name, ctx))
                }

                ExpressionNode::Index { base, index } => {
                    let base_value = self.evaluate(base, ctx).await?;
                    let index_value = self.evaluate(index, ctx).await?;
                    self.evaluate_index(&base_value, &index_value)
                }

                ExpressionNode::UnaryOp { op, operand } => {
                    let operand_value = self.evaluate(operand, ctx).await?;
                    operators::unary(*op, &operand_value)
                }

                ExpressionNode::BinaryOp(data) => {
                    self.evaluate_binary(data.op, &data.left, &data.right, ctx)
                        .await
                }

                ExpressionNode::TypeCheck {
                    expression,
                    type_specifier,
                } => {
                    let value = self.evaluate(expression, ctx).await?;
                    self.evaluate_type_check(&value, type_specifier)
                }

                ExpressionNode::TypeCast {
                    expression,
                    type_specifier,
                } => {
                    let value = self.evaluate(expression, ctx).await?;
                    Ok(self.evaluate_type_cast(&value, type_specifier))
                }

                ExpressionNode::FunctionCall(data) => {
                    trace!("function call: {}", data.name);
                    let input = ctx.input.clone();
                    self.call_function(ctx, input, &data.name, &data.args).await
                }

                ExpressionNode::MethodCall(data) => {
                    // Method dispatch on a host environment object
                    // (%terminologies.expand(...), %factory.string(...))
                    if let ExpressionNode::EnvironmentVariable(env_name) = &data.base {
                        if !ctx.variables.contains(env_name) {
                            if let Some(EnvValue::Host(host)) = ctx.env_value(env_name) {
                                let host = Arc::clone(host);
                                self.options
                                    .require_async(&format!("%{env_name}.{}", data.method))?;
                                let mut args = Vec::with_capacity(data.args.len());
                                for arg in &data.args {
                                    args.push(self.evaluate(arg, ctx).await?);
                                }
                                return host.invoke(&data.method, &args).await;
                            }
                        }
                    }
                    trace!("method call: {}", data.method);
                    let receiver = self.evaluate(&data.base, ctx).await?;
                    self.call_function(ctx, receiver, &data.method, &data.args)
                        .await
                }
            }
        })
    }

    /// Dispatch a function by name: the user table first, then built-ins
    pub(crate) async fn call_function(
        &self,
        ctx: &mut EvaluationContext,
        input: Collection,
        name: &str,
        args: &[ExpressionNode],
    ) -> EvaluationResult<Collection> {
        if let Some(user) = self.options.user_functions.get(name).cloned() {
            if !user.arity.contains(&args.len()) {
                return Err(EvaluationError::InvalidArgumentCount {
                    function: name.to_string(),
                    expected: format!("{}..{}", user.arity.start(), user.arity.end()),
                    actual: args.len(),
                });
            }
            if !user.nullable && input.is_empty() {
                return Ok(Collection::empty());
            }
            let mut eval_args = Vec::with_capacity(args.len());
            for arg in args {
                eval_args.push(self.evaluate(arg, ctx).await?);
            }
            return (user.implementation)(&input, &eval_args);
        }

        registry::dispatch(self, ctx, &input, name, args).await
    }

    fn evaluate_literal(&self, literal: &LiteralValue) -> EvaluationResult<Collection> {
        let value = match literal {
            LiteralValue::Boolean(b) => FhirPathValue::Boolean(*b),
            LiteralValue::Integer(i) => FhirPathValue::Integer(*i),
            LiteralValue::String(s) => FhirPathValue::String(s.clone()),
            LiteralValue::Decimal(s) => FhirPathValue::Decimal(
                parse_decimal(s)
                    .ok_or_else(|| EvaluationError::invalid(format!("invalid decimal: {s}")))?,
            ),
            LiteralValue::Date(s) => FhirPathValue::Date(
                Date::parse(s)
                    .ok_or_else(|| EvaluationError::invalid(format!("invalid date: @{s}")))?,
            ),
            LiteralValue::DateTime(s) => FhirPathValue::DateTime(
                DateTime::parse(s)
                    .ok_or_else(|| EvaluationError::invalid(format!("invalid datetime: @{s}")))?,
            ),
            LiteralValue::Time(s) => FhirPathValue::Time(
                Time::parse(s)
                    .ok_or_else(|| EvaluationError::invalid(format!("invalid time: @T{s}")))?,
            ),
            LiteralValue::Quantity { value, unit } => {
                let value = parse_decimal(value).ok_or_else(|| {
                    EvaluationError::invalid(format!("invalid quantity value: {value}"))
                })?;
                FhirPathValue::Quantity(Quantity::new(value, Some(unit.clone())))
            }
        };
        Ok(Collection::singleton_of(value))
    }

    fn evaluate_identifier(&self, name: &str, ctx: &EvaluationContext) -> Collection {
        // defineVariable bindings shadow navigation for that name
        if let Some(value) = ctx.variables.get_variable(name) {
            return value.clone();
        }
        navigate(&ctx.input, name)
    }

    fn evaluate_variable(&self, name: &str, ctx: &EvaluationContext) -> Collection {
        match name {
            "this" => ctx.this.clone(),
            "index" => match ctx.index {
                Some(index) => Collection::singleton_of(FhirPathValue::Integer(index)),
                None => Collection::empty(),
            },
            "total" => ctx.total.clone().unwrap_or_default(),
            _ => Collection::empty(),
        }
    }

    fn evaluate_environment_variable(&self, name: &str, ctx: &EvaluationContext) -> Collection {
        if let Some(value) = ctx.variables.get_variable(name) {
            return value.clone();
        }
        match ctx.env_value(name) {
            Some(EnvValue::Value(collection)) => collection.clone(),
            // Host objects are only reachable through method dispatch
            Some(EnvValue::Host(_)) | None => Collection::empty(),
        }
    }

    fn evaluate_index(
        &self,
        base: &Collection,
        index: &Collection,
    ) -> EvaluationResult<Collection> {
        if index.is_empty() {
            return Ok(Collection::empty());
        }
        let item = operators::require_singleton(index, "indexer")?;
        let Some(i) = item.as_integer() else {
            return Err(EvaluationError::type_error("Integer", item.type_name()));
        };
        if i < 0 {
            return Ok(Collection::empty());
        }
        Ok(match base.get(i as usize) {
            Some(value) => Collection::singleton_of(value.clone()),
            None => Collection::empty(),
        })
    }

    async fn evaluate_binary(
        &self,
        op: BinaryOperator,
        left: &ExpressionNode,
        right: &ExpressionNode,
        ctx: &mut EvaluationContext,
    ) -> EvaluationResult<Collection> {
        use BinaryOperator::*;
        match op {
            And | Or | Xor | Implies => self.evaluate_logical(op, left, right, ctx).await,
            _ => {
                let left_value = self.evaluate(left, ctx).await?;
                let right_value = self.evaluate(right, ctx).await?;
                match op {
                    Union => Ok(left_value.union(&right_value)),
                    Concatenate => operators::concatenate(&left_value, &right_value),
                    Equal => Ok(boolean_or_empty(operators::collection_equality(
                        &left_value,
                        &right_value,
                    ))),
                    NotEqual => Ok(boolean_or_empty(
                        operators::collection_equality(&left_value, &right_value).map(|b| !b),
                    )),
                    Equivalent => Ok(Collection::singleton_of(FhirPathValue::Boolean(
                        operators::collection_equivalence(&left_value, &right_value),
                    ))),
                    NotEquivalent => Ok(Collection::singleton_of(FhirPathValue::Boolean(
                        !operators::collection_equivalence(&left_value, &right_value),
                    ))),
                    LessThan | LessThanOrEqual | GreaterThan | GreaterThanOrEqual => {
                        operators::compare(op, &left_value, &right_value)
                    }
                    In => operators::membership(&left_value, &right_value),
                    Contains => operators::membership(&right_value, &left_value),
                    Add | Subtract | Multiply | Divide | IntegerDivide | Modulo => {
                        operators::arithmetic(op, &left_value, &right_value)
                    }
                    And | Or | Xor | Implies => unreachable!(),
                }
            }
        }
    }

    /// Three-valued logic with short-circuit on the left operand:
    /// `and` with left false is false, `or` with left true is true, and
    /// `implies` with left false or empty is true
    async fn evaluate_logical(
        &self,
        op: BinaryOperator,
        left: &ExpressionNode,
        right: &ExpressionNode,
        ctx: &mut EvaluationContext,
    ) -> EvaluationResult<Collection> {
        use BinaryOperator::*;

        let left_value = self.evaluate(left, ctx).await?;
        let l = boolean3(&left_value)?;

        match (op, l) {
            (And, Some(false)) => return Ok(boolean_collection(false)),
            (Or, Some(true)) => return Ok(boolean_collection(true)),
            (Implies, Some(false)) | (Implies, None) => return Ok(boolean_collection(true)),
            _ => {}
        }

        let right_value = self.evaluate(right, ctx).await?;
        let r = boolean3(&right_value)?;

        let result: Option<bool> = match op {
            // l is true or empty here
            And => match (l, r) {
                (Some(true), r) => r,
                (None, Some(false)) => Some(false),
                (None, _) => None,
                _ => unreachable!(),
            },
            // l is false or empty here
            Or => match (l, r) {
                (Some(false), r) => r,
                (None, Some(true)) => Some(true),
                (None, _) => None,
                _ => unreachable!(),
            },
            Xor => match (l, r) {
                (Some(a), Some(b)) => Some(a != b),
                _ => None,
            },
            // l is true here
            Implies => r,
            _ => unreachable!(),
        };

        Ok(boolean_or_empty(result))
    }

    fn evaluate_type_check(
        &self,
        value: &Collection,
        type_specifier: &TypeSpecifier,
    ) -> EvaluationResult<Collection> {
        if value.is_empty() {
            return Ok(Collection::empty());
        }
        let item = operators::require_singleton(value, "is")?;
        Ok(boolean_collection(registry::typing::value_is_of_type(
            item,
            type_specifier,
            &self.options,
        )))
    }

    fn evaluate_type_cast(&self, value: &Collection, type_specifier: &TypeSpecifier) -> Collection {
        value
            .iter()
            .filter(|item| registry::typing::value_is_of_type(item, type_specifier, &self.options))
            .cloned()
            .collect()
    }
}

/// Identifier navigation over a collection: direct properties splice
/// arrays and drop nulls, and every key following the `value[x]` choice
/// convention for the name is taken as well. An uppercase identifier
/// matching an item's `resourceType` selects the item itself. Quantity
/// items expose `value` and `unit`.
pub(crate) fn navigate(input: &Collection, name: &str) -> Collection {
    let mut out = Vec::new();
    let type_head = name.chars().next().is_some_and(|c| c.is_ascii_uppercase());
    for item in input.iter() {
        if let FhirPathValue::Quantity(q) = item {
            match name {
                "value" => out.push(FhirPathValue::Decimal(q.value)),
                "unit" => {
                    if let Some(unit) = &q.unit {
                        out.push(FhirPathValue::String(unit.clone()));
                    }
                }
                _ => {}
            }
            continue;
        }
        let FhirPathValue::Resource(resource) = item else {
            continue;
        };
        if type_head && resource.resource_type() == Some(name) {
            out.push(item.clone());
            continue;
        }
        if let Some(value) = resource.property(name) {
            Collection::splice_json(value, &mut out);
        }
        for (_, value) in resource.polymorphic_properties(name) {
            Collection::splice_json(value, &mut out);
        }
    }
    Collection::from_vec(out)
}

/// Read a collection as a three-valued boolean: empty, a single boolean,
/// or an error
pub(crate) fn boolean3(collection: &Collection) -> EvaluationResult<Option<bool>> {
    if collection.is_empty() {
        return Ok(None);
    }
    let item = operators::require_singleton(collection, "boolean operator")?;
    match item.as_boolean() {
        Some(b) => Ok(Some(b)),
        None => Err(EvaluationError::type_error("Boolean", item.type_name())),
    }
}

/// A one-element boolean collection
pub(crate) fn boolean_collection(value: bool) -> Collection {
    Collection::singleton_of(FhirPathValue::Boolean(value))
}

/// A boolean singleton, or empty for an undefined result
pub(crate) fn boolean_or_empty(value: Option<bool>) -> Collection {
    match value {
        Some(b) => boolean_collection(b),
        None => Collection::empty(),
    }
}
