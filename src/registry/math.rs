//! Math functions
//!
//! Exact decimal arithmetic where possible; `sqrt`, `exp`, `ln`, `log` and
//! fractional `power` go through f64 and come back as decimals. Domain
//! violations (`sqrt(-1)`, `ln(0)`) yield empty collections, never errors.

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::evaluator::operators::require_singleton;
use crate::evaluator::{EvaluationError, EvaluationResult};
use crate::model::{Collection, FhirPathValue};

use super::{singleton_integer, singleton_numeric};

fn integer_result(value: i64) -> Collection {
    Collection::singleton_of(FhirPathValue::Integer(value))
}

fn decimal_result(value: Decimal) -> Collection {
    Collection::singleton_of(FhirPathValue::Decimal(value.normalize()))
}

/// Wrap an f64 computation result, mapping NaN/infinity to empty
fn float_result(value: f64) -> Collection {
    if !value.is_finite() {
        return Collection::empty();
    }
    match Decimal::from_f64(value) {
        Some(d) => decimal_result(d),
        None => Collection::empty(),
    }
}

/// `abs()`: integers, decimals and quantities
pub fn abs(input: &Collection) -> EvaluationResult<Collection> {
    if input.is_empty() {
        return Ok(Collection::empty());
    }
    let item = require_singleton(input, "abs")?;
    let result = match item {
        FhirPathValue::Integer(i) => FhirPathValue::Integer(i.abs()),
        FhirPathValue::Decimal(d) => FhirPathValue::Decimal(d.abs()),
        FhirPathValue::Quantity(q) => {
            let mut q = q.clone();
            q.value = q.value.abs();
            FhirPathValue::Quantity(q)
        }
        other => return Err(EvaluationError::type_error("number", other.type_name())),
    };
    Ok(Collection::singleton_of(result))
}

/// `ceiling()`: smallest integer at or above
pub fn ceiling(input: &Collection) -> EvaluationResult<Collection> {
    Ok(match singleton_numeric(input, "ceiling")? {
        Some(n) => match n.ceil().to_i64() {
            Some(i) => integer_result(i),
            None => Collection::empty(),
        },
        None => Collection::empty(),
    })
}

/// `floor()`: largest integer at or below
pub fn floor(input: &Collection) -> EvaluationResult<Collection> {
    Ok(match singleton_numeric(input, "floor")? {
        Some(n) => match n.floor().to_i64() {
            Some(i) => integer_result(i),
            None => Collection::empty(),
        },
        None => Collection::empty(),
    })
}

/// `round([precision])`: half-away-from-zero to the given decimal places
pub fn round(input: &Collection, args: &[Collection]) -> EvaluationResult<Collection> {
    let Some(n) = singleton_numeric(input, "round")? else {
        return Ok(Collection::empty());
    };
    let precision = match args.first() {
        Some(arg) => match singleton_integer(arg, "round")? {
            Some(p) if p >= 0 => p as u32,
            Some(_) => {
                return Err(EvaluationError::InvalidArgument {
                    function: "round".to_string(),
                    message: "precision must be non-negative".to_string(),
                });
            }
            None => return Ok(Collection::empty()),
        },
        None => 0,
    };
    Ok(decimal_result(n.round_dp_with_strategy(
        precision,
        rust_decimal::RoundingStrategy::MidpointAwayFromZero,
    )))
}

/// `truncate()`: drop the fractional part
pub fn truncate(input: &Collection) -> EvaluationResult<Collection> {
    Ok(match singleton_numeric(input, "truncate")? {
        Some(n) => match n.trunc().to_i64() {
            Some(i) => integer_result(i),
            None => Collection::empty(),
        },
        None => Collection::empty(),
    })
}

/// `sqrt()`: square root; negative input yields empty
pub fn sqrt(input: &Collection) -> EvaluationResult<Collection> {
    Ok(match singleton_numeric(input, "sqrt")? {
        Some(n) => match n.to_f64() {
            Some(f) if f >= 0.0 => float_result(f.sqrt()),
            _ => Collection::empty(),
        },
        None => Collection::empty(),
    })
}

/// `exp()`: e raised to the input
pub fn exp(input: &Collection) -> EvaluationResult<Collection> {
    Ok(match singleton_numeric(input, "exp")? {
        Some(n) => match n.to_f64() {
            Some(f) => float_result(f.exp()),
            None => Collection::empty(),
        },
        None => Collection::empty(),
    })
}

/// `ln()`: natural logarithm; non-positive input yields empty
pub fn ln(input: &Collection) -> EvaluationResult<Collection> {
    Ok(match singleton_numeric(input, "ln")? {
        Some(n) => match n.to_f64() {
            Some(f) if f > 0.0 => float_result(f.ln()),
            _ => Collection::empty(),
        },
        None => Collection::empty(),
    })
}

/// `log(base)`: logarithm in the given base; invalid domain yields empty
pub fn log(input: &Collection, base: &Collection) -> EvaluationResult<Collection> {
    let (Some(n), Some(b)) = (
        singleton_numeric(input, "log")?,
        singleton_numeric(base, "log")?,
    ) else {
        return Ok(Collection::empty());
    };
    Ok(match (n.to_f64(), b.to_f64()) {
        // log10/log2 are better-rounded than the general quotient form
        (Some(n), Some(b)) if n > 0.0 && b == 10.0 => float_result(n.log10()),
        (Some(n), Some(b)) if n > 0.0 && b == 2.0 => float_result(n.log2()),
        (Some(n), Some(b)) if n > 0.0 && b > 0.0 => float_result(n.log(b)),
        _ => Collection::empty(),
    })
}

/// `power(exponent)`: integer fast path, f64 otherwise; undefined results
/// (negative base with fractional exponent) yield empty
pub fn power(input: &Collection, exponent: &Collection) -> EvaluationResult<Collection> {
    if input.is_empty() || exponent.is_empty() {
        return Ok(Collection::empty());
    }
    let base = require_singleton(input, "power")?;
    let exp = require_singleton(exponent, "power")?;

    if let (FhirPathValue::Integer(b), FhirPathValue::Integer(e)) = (base, exp) {
        if (0..=u32::MAX as i64).contains(e) {
            if let Some(result) = b.checked_pow(*e as u32) {
                return Ok(integer_result(result));
            }
        }
    }

    let (Some(b), Some(e)) = (base.as_numeric(), exp.as_numeric()) else {
        return Err(EvaluationError::type_error(
            "number",
            if base.as_numeric().is_none() {
                base.type_name()
            } else {
                exp.type_name()
            },
        ));
    };
    Ok(match (b.to_f64(), e.to_f64()) {
        (Some(b), Some(e)) => float_result(b.powf(e)),
        _ => Collection::empty(),
    })
}
