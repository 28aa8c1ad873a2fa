//! Logic functions: `not()` and the lazy conditional `iif()`

use crate::ast::ExpressionNode;
use crate::evaluator::engine::{Evaluator, boolean3, boolean_or_empty};
use crate::evaluator::{EvaluationContext, EvaluationResult};
use crate::model::Collection;

/// `not()`: boolean negation, empty stays empty
pub fn not(input: &Collection) -> EvaluationResult<Collection> {
    Ok(boolean_or_empty(boolean3(input)?.map(|b| !b)))
}

/// `iif(condition, then [, else])`: lazy in both branches. A condition
/// that is not a single true selects the else branch (or empty).
pub async fn iif(
    ev: &Evaluator,
    ctx: &mut EvaluationContext,
    input: &Collection,
    args: &[ExpressionNode],
) -> EvaluationResult<Collection> {
    // The condition and branches see the receiver as their context
    let mut frame = ctx.with_input(input.clone());
    let condition = ev.evaluate(&args[0], &mut frame).await?;

    if boolean3(&condition)? == Some(true) {
        ev.evaluate(&args[1], &mut frame).await
    } else {
        match args.get(2) {
            Some(else_branch) => ev.evaluate(else_branch, &mut frame).await,
            None => Ok(Collection::empty()),
        }
    }
}
