//! Conversion functions: `toX` returning empty on failure and
//! `convertsToX` returning a boolean
//!
//! Boolean conversion accepts `true`/`1` and `false`/`0` (and their string
//! forms). Number conversion from strings is strict: anything that is not a
//! number is rejected. Date conversion validates the FHIRPath grammar;
//! DateTime additionally falls back to general ISO 8601.

use rust_decimal::Decimal;

use crate::evaluator::engine::boolean_collection;
use crate::evaluator::operators::require_singleton;
use crate::evaluator::EvaluationResult;
use crate::model::value::parse_decimal;
use crate::model::{Collection, Date, DateTime, FhirPathValue, Quantity, Time};

use super::singleton_string;

fn result_of(value: Option<FhirPathValue>) -> Collection {
    match value {
        Some(v) => Collection::singleton_of(v),
        None => Collection::empty(),
    }
}

/// `toInteger()`
pub fn to_integer(input: &Collection) -> EvaluationResult<Collection> {
    if input.is_empty() {
        return Ok(Collection::empty());
    }
    let item = require_singleton(input, "toInteger")?;
    let converted = match item {
        FhirPathValue::Integer(i) => Some(FhirPathValue::Integer(*i)),
        FhirPathValue::Boolean(b) => Some(FhirPathValue::Integer(i64::from(*b))),
        FhirPathValue::String(s) => s.parse::<i64>().ok().map(FhirPathValue::Integer),
        _ => None,
    };
    Ok(result_of(converted))
}

/// `toDecimal()`
pub fn to_decimal(input: &Collection) -> EvaluationResult<Collection> {
    if input.is_empty() {
        return Ok(Collection::empty());
    }
    let item = require_singleton(input, "toDecimal")?;
    let converted = match item {
        FhirPathValue::Decimal(d) => Some(FhirPathValue::Decimal(*d)),
        FhirPathValue::Integer(i) => Some(FhirPathValue::Decimal(Decimal::from(*i))),
        FhirPathValue::Boolean(b) => Some(FhirPathValue::Decimal(Decimal::from(i64::from(*b)))),
        FhirPathValue::String(s) => parse_decimal(s.trim()).map(FhirPathValue::Decimal),
        _ => None,
    };
    Ok(result_of(converted))
}

/// `toString()`
pub fn to_string(input: &Collection) -> EvaluationResult<Collection> {
    if input.is_empty() {
        return Ok(Collection::empty());
    }
    let item = require_singleton(input, "toString")?;
    Ok(result_of(item.to_string_value().map(FhirPathValue::String)))
}

/// `toBoolean()`
pub fn to_boolean(input: &Collection) -> EvaluationResult<Collection> {
    if input.is_empty() {
        return Ok(Collection::empty());
    }
    let item = require_singleton(input, "toBoolean")?;
    let converted = match item {
        FhirPathValue::Boolean(b) => Some(*b),
        FhirPathValue::Integer(1) => Some(true),
        FhirPathValue::Integer(0) => Some(false),
        FhirPathValue::Decimal(d) if *d == Decimal::ONE => Some(true),
        FhirPathValue::Decimal(d) if d.is_zero() => Some(false),
        FhirPathValue::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    };
    Ok(result_of(converted.map(FhirPathValue::Boolean)))
}

/// `toDate()`
pub fn to_date(input: &Collection) -> EvaluationResult<Collection> {
    if input.is_empty() {
        return Ok(Collection::empty());
    }
    let item = require_singleton(input, "toDate")?;
    let converted = match item {
        FhirPathValue::Date(d) => Some(FhirPathValue::Date(*d)),
        FhirPathValue::DateTime(dt) => {
            // Truncate to the date part; the string round-trip keeps the
            // original date precision
            let text = dt.to_string();
            let date_part = text.split('T').next().unwrap_or(&text);
            Date::parse(date_part).map(FhirPathValue::Date)
        }
        FhirPathValue::String(s) => Date::parse(s).map(FhirPathValue::Date),
        _ => None,
    };
    Ok(result_of(converted))
}

/// `toDateTime()`: FHIRPath grammar first, general ISO 8601 as a fallback
pub fn to_datetime(input: &Collection) -> EvaluationResult<Collection> {
    if input.is_empty() {
        return Ok(Collection::empty());
    }
    let item = require_singleton(input, "toDateTime")?;
    let converted = match item {
        FhirPathValue::DateTime(dt) => Some(FhirPathValue::DateTime(*dt)),
        FhirPathValue::Date(d) => DateTime::parse(&d.to_string()).map(FhirPathValue::DateTime),
        FhirPathValue::String(s) => DateTime::parse(s)
            .or_else(|| DateTime::parse_iso8601(s))
            .map(FhirPathValue::DateTime),
        _ => None,
    };
    Ok(result_of(converted))
}

/// `toTime()`: rejects out-of-range hours, minutes and seconds
pub fn to_time(input: &Collection) -> EvaluationResult<Collection> {
    if input.is_empty() {
        return Ok(Collection::empty());
    }
    let item = require_singleton(input, "toTime")?;
    let converted = match item {
        FhirPathValue::Time(t) => Some(FhirPathValue::Time(*t)),
        FhirPathValue::String(s) => {
            let s = s.strip_prefix('T').unwrap_or(s);
            Time::parse(s).map(FhirPathValue::Time)
        }
        _ => None,
    };
    Ok(result_of(converted))
}

/// `toQuantity([unit])`: accepts numbers, quantities and the textual forms
/// `number`, `number unit`, `number 'unit'`. A target unit that differs
/// from the value's unit yields empty (no unit conversion here).
pub fn to_quantity(input: &Collection, args: &[Collection]) -> EvaluationResult<Collection> {
    if input.is_empty() {
        return Ok(Collection::empty());
    }
    let item = require_singleton(input, "toQuantity")?;
    let quantity = match item {
        FhirPathValue::Quantity(q) => Some(q.clone()),
        FhirPathValue::Integer(i) => Some(Quantity::unitless(Decimal::from(*i))),
        FhirPathValue::Decimal(d) => Some(Quantity::unitless(*d)),
        FhirPathValue::String(s) => Quantity::parse(s),
        FhirPathValue::Boolean(b) => Some(Quantity::unitless(Decimal::from(i64::from(*b)))),
        _ => None,
    };

    let quantity = match (quantity, args.first()) {
        (Some(q), Some(unit_arg)) => {
            let Some(unit) = singleton_string(unit_arg, "toQuantity")? else {
                return Ok(Collection::empty());
            };
            let target = Quantity::new(q.value, Some(unit.to_string()));
            match &q.unit {
                // A unitless value adopts the requested unit
                None => Some(target),
                Some(_) if q.same_unit(&target) => Some(q),
                Some(_) => None,
            }
        }
        (None, _) => None,
        (q, None) => q,
    };

    Ok(result_of(quantity.map(FhirPathValue::Quantity)))
}

/// Shared `convertsToX` shape: empty in, empty out; otherwise whether the
/// conversion produced a value
pub fn converts(
    input: &Collection,
    convert: impl Fn(&Collection) -> EvaluationResult<Collection>,
) -> EvaluationResult<Collection> {
    if input.is_empty() {
        return Ok(Collection::empty());
    }
    let result = convert(input)?;
    Ok(boolean_collection(!result.is_empty()))
}
