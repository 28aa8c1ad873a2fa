//! Existence functions: `empty`, `exists`, `all`, the boolean-collection
//! tests, `hasValue`, `isDistinct`, `subsetOf`, `supersetOf`

use crate::ast::ExpressionNode;
use crate::evaluator::engine::{Evaluator, boolean_collection, boolean3};
use crate::evaluator::{EvaluationContext, EvaluationError, EvaluationResult};
use crate::model::{Collection, FhirPathValue};

/// `empty()`: true when the collection has no items
pub fn empty(input: &Collection) -> Collection {
    boolean_collection(input.is_empty())
}

/// `exists([criteria])`: without criteria, a non-empty test; with criteria,
/// true when any item satisfies it
pub async fn exists(
    ev: &Evaluator,
    ctx: &mut EvaluationContext,
    input: &Collection,
    args: &[ExpressionNode],
) -> EvaluationResult<Collection> {
    let Some(criteria) = args.first() else {
        return Ok(boolean_collection(!input.is_empty()));
    };
    for (index, item) in input.iter().enumerate() {
        ev.options().check_abort()?;
        let mut frame = ctx.with_item(item, index);
        let verdict = ev.evaluate(criteria, &mut frame).await?;
        if boolean3(&verdict)? == Some(true) {
            return Ok(boolean_collection(true));
        }
    }
    Ok(boolean_collection(false))
}

/// `all(criteria)`: true when every item satisfies the criteria;
/// vacuously true on empty input
pub async fn all(
    ev: &Evaluator,
    ctx: &mut EvaluationContext,
    input: &Collection,
    criteria: &ExpressionNode,
) -> EvaluationResult<Collection> {
    for (index, item) in input.iter().enumerate() {
        ev.options().check_abort()?;
        let mut frame = ctx.with_item(item, index);
        let verdict = ev.evaluate(criteria, &mut frame).await?;
        if boolean3(&verdict)? != Some(true) {
            return Ok(boolean_collection(false));
        }
    }
    Ok(boolean_collection(true))
}

fn booleans(input: &Collection) -> EvaluationResult<Vec<bool>> {
    input
        .iter()
        .map(|item| {
            item.as_boolean()
                .ok_or_else(|| EvaluationError::type_error("Boolean", item.type_name()))
        })
        .collect()
}

/// `allTrue()`: every item is true (vacuously true on empty)
pub fn all_true(input: &Collection) -> EvaluationResult<Collection> {
    Ok(boolean_collection(booleans(input)?.iter().all(|b| *b)))
}

/// `anyTrue()`: at least one item is true
pub fn any_true(input: &Collection) -> EvaluationResult<Collection> {
    Ok(boolean_collection(booleans(input)?.iter().any(|b| *b)))
}

/// `allFalse()`: every item is false (vacuously true on empty)
pub fn all_false(input: &Collection) -> EvaluationResult<Collection> {
    Ok(boolean_collection(booleans(input)?.iter().all(|b| !b)))
}

/// `anyFalse()`: at least one item is false
pub fn any_false(input: &Collection) -> EvaluationResult<Collection> {
    Ok(boolean_collection(booleans(input)?.iter().any(|b| !b)))
}

/// `hasValue()`: the input is a single primitive value
pub fn has_value(input: &Collection) -> Collection {
    let result = matches!(
        input.singleton(),
        Some(item) if !matches!(item, FhirPathValue::Resource(_))
    );
    boolean_collection(result)
}

/// `isDistinct()`: no two items are equal (vacuously true on empty)
pub fn is_distinct(input: &Collection) -> Collection {
    boolean_collection(input.distinct().len() == input.len())
}

/// `subsetOf(other)`: every item also appears in `other`
pub fn subset_of(input: &Collection, other: &Collection) -> Collection {
    boolean_collection(input.iter().all(|item| other.contains_value(item)))
}

/// `supersetOf(other)`: every item of `other` also appears here
pub fn superset_of(input: &Collection, other: &Collection) -> Collection {
    boolean_collection(other.iter().all(|item| input.contains_value(item)))
}
