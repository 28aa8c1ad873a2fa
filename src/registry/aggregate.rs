//! Aggregate functions: `count`, `sum`, `min`, `max`, `avg`, `aggregate`

use std::cmp::Ordering;

use rust_decimal::Decimal;

use crate::ast::ExpressionNode;
use crate::evaluator::engine::Evaluator;
use crate::evaluator::operators::item_compare;
use crate::evaluator::{EvaluationContext, EvaluationError, EvaluationResult};
use crate::model::{Collection, FhirPathValue, Quantity};

/// `count()`
pub fn count(input: &Collection) -> Collection {
    Collection::singleton_of(FhirPathValue::Integer(input.len() as i64))
}

/// `sum()`: numeric or same-unit quantity sum; empty in, empty out
pub fn sum(input: &Collection) -> EvaluationResult<Collection> {
    if input.is_empty() {
        return Ok(Collection::empty());
    }

    if let Some(FhirPathValue::Quantity(_)) = input.first() {
        let mut total: Option<Quantity> = None;
        for item in input.iter() {
            let FhirPathValue::Quantity(q) = item else {
                return Err(EvaluationError::type_error("Quantity", item.type_name()));
            };
            total = Some(match total {
                None => q.clone(),
                Some(acc) => match acc.checked_add(q) {
                    Some(next) => next,
                    None => return Ok(Collection::empty()),
                },
            });
        }
        return Ok(match total {
            Some(q) => Collection::singleton_of(FhirPathValue::Quantity(q)),
            None => Collection::empty(),
        });
    }

    let mut all_integers = true;
    let mut total = Decimal::ZERO;
    for item in input.iter() {
        let Some(value) = item.as_numeric() else {
            return Err(EvaluationError::type_error("number", item.type_name()));
        };
        if !matches!(item, FhirPathValue::Integer(_)) {
            all_integers = false;
        }
        total += value;
    }
    Ok(Collection::singleton_of(numeric_result(total, all_integers)))
}

/// `avg()`: numeric average as a decimal; empty in, empty out
pub fn avg(input: &Collection) -> EvaluationResult<Collection> {
    if input.is_empty() {
        return Ok(Collection::empty());
    }
    let mut total = Decimal::ZERO;
    for item in input.iter() {
        let Some(value) = item.as_numeric() else {
            return Err(EvaluationError::type_error("number", item.type_name()));
        };
        total += value;
    }
    let mean = total / Decimal::from(input.len() as i64);
    Ok(Collection::singleton_of(FhirPathValue::Decimal(
        mean.normalize(),
    )))
}

/// `min()`: smallest item of a mutually comparable collection
pub fn min(input: &Collection) -> EvaluationResult<Collection> {
    extremum(input, Ordering::Less)
}

/// `max()`: largest item of a mutually comparable collection
pub fn max(input: &Collection) -> EvaluationResult<Collection> {
    extremum(input, Ordering::Greater)
}

fn extremum(input: &Collection, keep: Ordering) -> EvaluationResult<Collection> {
    let mut best: Option<&FhirPathValue> = None;
    for item in input.iter() {
        best = Some(match best {
            None => item,
            Some(current) => match item_compare(item, current)? {
                Some(ordering) if ordering == keep => item,
                Some(_) => current,
                // Undefined comparison (partial temporals) has no extremum
                None => return Ok(Collection::empty()),
            },
        });
    }
    Ok(match best {
        Some(item) => Collection::singleton_of(item.clone()),
        None => Collection::empty(),
    })
}

/// `aggregate(expr [, init])`: fold in collection order with `$this` and
/// `$total` bound per step; the final `$total` is the result
pub async fn aggregate_fn(
    ev: &Evaluator,
    ctx: &mut EvaluationContext,
    input: &Collection,
    args: &[ExpressionNode],
) -> EvaluationResult<Collection> {
    let mut total = match args.get(1) {
        Some(init) => ev.evaluate(init, ctx).await?,
        None => Collection::empty(),
    };

    for (index, item) in input.iter().enumerate() {
        ev.options().check_abort()?;
        let mut frame = ctx.with_item(item, index);
        frame.total = Some(total);
        total = ev.evaluate(&args[0], &mut frame).await?;
    }

    Ok(total)
}

fn numeric_result(value: Decimal, as_integer: bool) -> FhirPathValue {
    use rust_decimal::prelude::ToPrimitive;
    match value.to_i64() {
        Some(i) if as_integer => FhirPathValue::Integer(i),
        _ => FhirPathValue::Decimal(value),
    }
}
