//! Utility functions: `trace` and `defineVariable`

use log::debug;

use crate::ast::ExpressionNode;
use crate::evaluator::engine::Evaluator;
use crate::evaluator::{EvaluationContext, EvaluationError, EvaluationResult};
use crate::model::Collection;

use super::singleton_string;

/// Environment names that `defineVariable` may not shadow
const PROTECTED_NAMES: &[&str] = &[
    "context",
    "resource",
    "rootResource",
    "ucum",
    "terminologies",
];

/// `trace(label [, projection])`: forward to the configured sink and
/// return the input unchanged
pub async fn trace(
    ev: &Evaluator,
    ctx: &mut EvaluationContext,
    input: &Collection,
    args: &[ExpressionNode],
) -> EvaluationResult<Collection> {
    let label_value = ev.evaluate(&args[0], ctx).await?;
    let Some(label) = singleton_string(&label_value, "trace")? else {
        return Ok(input.clone());
    };

    if let Some(sink) = ev.options().trace.clone() {
        match args.get(1) {
            Some(projection) => {
                let mut frame = ctx.with_input(input.clone());
                let projected = ev.evaluate(projection, &mut frame).await?;
                sink(label, &projected);
            }
            None => sink(label, input),
        }
    } else {
        debug!("trace({label}): {input:?}");
    }

    Ok(input.clone())
}

/// `defineVariable(name [, value])`: bind a variable visible to the rest
/// of the enclosing expression and return the input unchanged. Without a
/// value expression the input itself is bound.
pub async fn define_variable(
    ev: &Evaluator,
    ctx: &mut EvaluationContext,
    input: &Collection,
    args: &[ExpressionNode],
) -> EvaluationResult<Collection> {
    let name_value = ev.evaluate(&args[0], ctx).await?;
    let Some(name) = singleton_string(&name_value, "defineVariable")? else {
        return Err(EvaluationError::InvalidArgument {
            function: "defineVariable".to_string(),
            message: "expected a variable name".to_string(),
        });
    };
    if PROTECTED_NAMES.contains(&name) {
        return Err(EvaluationError::InvalidArgument {
            function: "defineVariable".to_string(),
            message: format!("cannot redefine %{name}"),
        });
    }
    let name = name.to_string();

    let value = match args.get(1) {
        Some(expr) => {
            let mut frame = ctx.with_input(input.clone());
            ev.evaluate(expr, &mut frame).await?
        }
        None => input.clone(),
    };

    ctx.variables.set_variable(name, value);
    Ok(input.clone())
}
