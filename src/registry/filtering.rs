//! Filtering and projection: `where`, `select`, `ofType`, `repeat`

use crate::ast::ExpressionNode;
use crate::evaluator::engine::{Evaluator, boolean3};
use crate::evaluator::{EvaluationContext, EvaluationError, EvaluationResult};
use crate::model::Collection;

use super::typing;

/// Iteration cap for `repeat`
const REPEAT_LIMIT: usize = 1000;

/// `where(criteria)`: keep items whose criteria evaluates to true
pub async fn where_fn(
    ev: &Evaluator,
    ctx: &mut EvaluationContext,
    input: &Collection,
    criteria: &ExpressionNode,
) -> EvaluationResult<Collection> {
    let mut out = Vec::new();
    for (index, item) in input.iter().enumerate() {
        ev.options().check_abort()?;
        let mut frame = ctx.with_item(item, index);
        let verdict = ev.evaluate(criteria, &mut frame).await?;
        if boolean3(&verdict)? == Some(true) {
            out.push(item.clone());
        }
    }
    Ok(Collection::from_vec(out))
}

/// `select(projection)`: flat-map the projection over the items
pub async fn select_fn(
    ev: &Evaluator,
    ctx: &mut EvaluationContext,
    input: &Collection,
    projection: &ExpressionNode,
) -> EvaluationResult<Collection> {
    let mut out = Vec::new();
    for (index, item) in input.iter().enumerate() {
        ev.options().check_abort()?;
        let mut frame = ctx.with_item(item, index);
        let projected = ev.evaluate(projection, &mut frame).await?;
        out.extend(projected.iter().cloned());
    }
    Ok(Collection::from_vec(out))
}

/// `repeat(projection)`: apply the projection to the input, then to every
/// newly produced item, until nothing new appears. Output is deduplicated
/// by structural equality; the pass count is capped.
pub async fn repeat_fn(
    ev: &Evaluator,
    ctx: &mut EvaluationContext,
    input: &Collection,
    projection: &ExpressionNode,
) -> EvaluationResult<Collection> {
    let mut result = Collection::empty();
    let mut current = input.clone();

    for _ in 0..REPEAT_LIMIT {
        ev.options().check_abort()?;
        if current.is_empty() {
            return Ok(result);
        }
        let produced = select_fn(ev, ctx, &current, projection).await?;
        let mut fresh = Vec::new();
        for item in produced.iter() {
            if !result.contains_value(item) && !fresh.iter().any(|f| f == item) {
                fresh.push(item.clone());
            }
        }
        if fresh.is_empty() {
            return Ok(result);
        }
        current = Collection::from_vec(fresh);
        result = result.concat(&current);
    }

    Err(EvaluationError::IterationLimit {
        function: "repeat".to_string(),
        limit: REPEAT_LIMIT,
    })
}

/// `ofType(Type)`: keep the items passing the type check
pub fn of_type(
    ev: &Evaluator,
    input: &Collection,
    type_arg: &ExpressionNode,
) -> EvaluationResult<Collection> {
    let specifier = type_arg
        .as_type_specifier()
        .ok_or_else(|| EvaluationError::InvalidArgument {
            function: "ofType".to_string(),
            message: "expected a type specifier".to_string(),
        })?;
    Ok(input
        .iter()
        .filter(|item| typing::value_is_of_type(item, &specifier, ev.options()))
        .cloned()
        .collect())
}
