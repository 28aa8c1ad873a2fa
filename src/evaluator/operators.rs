//! Binary and unary operator semantics
//!
//! Collection-level rules live here: empty propagation through arithmetic
//! and comparison, collection equality/equivalence, membership, the string
//! concatenation operator, and the numeric tower (exact integers promoted
//! to exact decimals on demand).

use std::cmp::Ordering;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::error::{EvaluationError, EvaluationResult};
use crate::ast::{BinaryOperator, UnaryOperator};
use crate::model::{Collection, Date, DateTime, FhirPathValue, Time};

/// Equality of two items; `None` when the comparison has no answer
/// (temporal precision mismatch)
pub fn item_equality(a: &FhirPathValue, b: &FhirPathValue) -> Option<bool> {
    use FhirPathValue::*;
    match (a, b) {
        (Date(x), Date(y)) => temporal_eq(x.partial_cmp_fhir(y)),
        (DateTime(x), DateTime(y)) => temporal_eq(x.partial_cmp_fhir(y)),
        (Time(x), Time(y)) => temporal_eq(x.partial_cmp_fhir(y)),
        // Navigation yields strings for date-valued elements; comparison
        // against a temporal literal coerces the string side
        (String(s), Date(y)) | (Date(y), String(s)) => match self::Date::parse(s) {
            Some(x) => temporal_eq(x.partial_cmp_fhir(y)),
            None => Some(false),
        },
        (String(s), DateTime(y)) | (DateTime(y), String(s)) => match self::DateTime::parse(s) {
            Some(x) => temporal_eq(x.partial_cmp_fhir(y)),
            None => Some(false),
        },
        (String(s), Time(y)) | (Time(y), String(s)) => match self::Time::parse(s) {
            Some(x) => temporal_eq(x.partial_cmp_fhir(y)),
            None => Some(false),
        },
        _ => Some(a == b),
    }
}

fn temporal_eq(ordering: Option<Ordering>) -> Option<bool> {
    ordering.map(|o| o == Ordering::Equal)
}

/// Collection equality (`=`): empty propagates; differing counts are false;
/// otherwise pairwise in order, and any undefined pair makes the whole
/// comparison undefined
pub fn collection_equality(left: &Collection, right: &Collection) -> Option<bool> {
    if left.is_empty() || right.is_empty() {
        return None;
    }
    if left.len() != right.len() {
        return Some(false);
    }
    let mut undefined = false;
    for (a, b) in left.iter().zip(right.iter()) {
        match item_equality(a, b) {
            Some(false) => return Some(false),
            Some(true) => {}
            None => undefined = true,
        }
    }
    if undefined { None } else { Some(true) }
}

/// Collection equivalence (`~`): both empty is true, one empty is false,
/// otherwise pairwise equivalence with matching counts
pub fn collection_equivalence(left: &Collection, right: &Collection) -> bool {
    if left.is_empty() && right.is_empty() {
        return true;
    }
    if left.len() != right.len() {
        return false;
    }
    left.iter().zip(right.iter()).all(|(a, b)| a.equivalent(b))
}

/// Ordering of two items for `<` `>` `<=` `>=`; `Ok(None)` yields empty
pub fn item_compare(
    a: &FhirPathValue,
    b: &FhirPathValue,
) -> EvaluationResult<Option<Ordering>> {
    use FhirPathValue::*;
    match (a, b) {
        (Integer(_), Integer(_))
        | (Integer(_), Decimal(_))
        | (Decimal(_), Integer(_))
        | (Decimal(_), Decimal(_)) => {
            let (x, y) = (a.as_numeric().unwrap_or_default(), b.as_numeric().unwrap_or_default());
            Ok(Some(x.cmp(&y)))
        }
        // Codepoint-wise string ordering, never locale-dependent
        (String(x), String(y)) => Ok(Some(x.as_str().cmp(y.as_str()))),
        (Date(x), Date(y)) => Ok(x.partial_cmp_fhir(y)),
        (DateTime(x), DateTime(y)) => Ok(x.partial_cmp_fhir(y)),
        (Time(x), Time(y)) => Ok(x.partial_cmp_fhir(y)),
        (String(s), Date(y)) => Ok(self::Date::parse(s).and_then(|x| x.partial_cmp_fhir(y))),
        (Date(x), String(s)) => Ok(self::Date::parse(s).and_then(|y| x.partial_cmp_fhir(&y))),
        (String(s), DateTime(y)) => {
            Ok(self::DateTime::parse(s).and_then(|x| x.partial_cmp_fhir(y)))
        }
        (DateTime(x), String(s)) => {
            Ok(self::DateTime::parse(s).and_then(|y| x.partial_cmp_fhir(&y)))
        }
        (String(s), Time(y)) => Ok(self::Time::parse(s).and_then(|x| x.partial_cmp_fhir(y))),
        (Time(x), String(s)) => Ok(self::Time::parse(s).and_then(|y| x.partial_cmp_fhir(&y))),
        // Quantities with differing units have no defined order here
        (Quantity(x), Quantity(y)) => Ok(x.partial_cmp_fhir(y)),
        _ => Err(EvaluationError::type_error(
            a.type_name(),
            format!("{} (not comparable)", b.type_name()),
        )),
    }
}

/// Apply a comparison operator over two collections
pub fn compare(
    op: BinaryOperator,
    left: &Collection,
    right: &Collection,
) -> EvaluationResult<Collection> {
    if left.is_empty() || right.is_empty() {
        return Ok(Collection::empty());
    }
    let a = require_singleton(left, op.as_str())?;
    let b = require_singleton(right, op.as_str())?;
    let Some(ordering) = item_compare(a, b)? else {
        return Ok(Collection::empty());
    };
    let result = match op {
        BinaryOperator::LessThan => ordering == Ordering::Less,
        BinaryOperator::LessThanOrEqual => ordering != Ordering::Greater,
        BinaryOperator::GreaterThan => ordering == Ordering::Greater,
        BinaryOperator::GreaterThanOrEqual => ordering != Ordering::Less,
        _ => unreachable!("compare called with non-comparison operator"),
    };
    Ok(Collection::singleton_of(FhirPathValue::Boolean(result)))
}

/// Apply an arithmetic operator over two collections
pub fn arithmetic(
    op: BinaryOperator,
    left: &Collection,
    right: &Collection,
) -> EvaluationResult<Collection> {
    if left.is_empty() || right.is_empty() {
        return Ok(Collection::empty());
    }
    let a = require_singleton(left, op.as_str())?;
    let b = require_singleton(right, op.as_str())?;

    use BinaryOperator::*;
    use FhirPathValue::*;
    let result: Option<FhirPathValue> = match (op, a, b) {
        // String concatenation via '+': both operands must be strings
        (Add, String(x), String(y)) => Some(String(format!("{x}{y}"))),
        (Add, String(_), other) | (Add, other, String(_)) => {
            return Err(EvaluationError::type_error("String", other.type_name()));
        }
        (Add, Quantity(x), Quantity(y)) => x.checked_add(y).map(Quantity),
        (Subtract, Quantity(x), Quantity(y)) => x.checked_sub(y).map(Quantity),
        (Multiply, Quantity(x), other) | (Multiply, other, Quantity(x)) => {
            let factor = require_numeric(other, op)?;
            Some(Quantity(x.scale(factor)))
        }
        (Divide, Quantity(x), other) => {
            let divisor = require_numeric(other, op)?;
            if divisor.is_zero() {
                None
            } else {
                x.checked_div(divisor).map(Quantity)
            }
        }
        (Add, Integer(x), Integer(y)) => Some(match x.checked_add(*y) {
            Some(n) => Integer(n),
            None => Decimal(rust_decimal::Decimal::from(*x) + rust_decimal::Decimal::from(*y)),
        }),
        (Subtract, Integer(x), Integer(y)) => Some(match x.checked_sub(*y) {
            Some(n) => Integer(n),
            None => Decimal(rust_decimal::Decimal::from(*x) - rust_decimal::Decimal::from(*y)),
        }),
        (Multiply, Integer(x), Integer(y)) => Some(match x.checked_mul(*y) {
            Some(n) => Integer(n),
            None => Decimal(rust_decimal::Decimal::from(*x) * rust_decimal::Decimal::from(*y)),
        }),
        (Add, _, _) => {
            let (x, y) = (require_numeric(a, op)?, require_numeric(b, op)?);
            Some(Decimal(x + y))
        }
        (Subtract, _, _) => {
            let (x, y) = (require_numeric(a, op)?, require_numeric(b, op)?);
            Some(Decimal(x - y))
        }
        (Multiply, _, _) => {
            let (x, y) = (require_numeric(a, op)?, require_numeric(b, op)?);
            Some(Decimal(x * y))
        }
        // '/' always produces a decimal; divide by zero is empty, not error
        (Divide, _, _) => {
            let (x, y) = (require_numeric(a, op)?, require_numeric(b, op)?);
            x.checked_div(y).map(normalize_decimal)
        }
        (IntegerDivide, _, _) => {
            let (x, y) = (require_numeric(a, op)?, require_numeric(b, op)?);
            x.checked_div(y)
                .map(|q| q.trunc())
                .and_then(|q| q.to_i64())
                .map(Integer)
        }
        (Modulo, Integer(x), Integer(y)) => x.checked_rem(*y).map(Integer),
        (Modulo, _, _) => {
            let (x, y) = (require_numeric(a, op)?, require_numeric(b, op)?);
            x.checked_rem(y).map(Decimal)
        }
        _ => return Err(EvaluationError::invalid(format!("cannot apply {op}"))),
    };

    Ok(match result {
        Some(value) => Collection::singleton_of(value),
        None => Collection::empty(),
    })
}

/// String concatenation (`&`): each side's empty collection reads as `""`
pub fn concatenate(left: &Collection, right: &Collection) -> EvaluationResult<Collection> {
    let a = optional_string(left)?;
    let b = optional_string(right)?;
    Ok(Collection::singleton_of(FhirPathValue::String(format!(
        "{a}{b}"
    ))))
}

/// Membership (`in`): equality of the single left item against each right item
pub fn membership(left: &Collection, right: &Collection) -> EvaluationResult<Collection> {
    if left.is_empty() {
        return Ok(Collection::empty());
    }
    let needle = require_singleton(left, "in")?;
    let found = right
        .iter()
        .any(|item| item_equality(needle, item) == Some(true));
    Ok(Collection::singleton_of(FhirPathValue::Boolean(found)))
}

/// Unary `+` / `-` on a single numeric value or quantity
pub fn unary(op: UnaryOperator, operand: &Collection) -> EvaluationResult<Collection> {
    if operand.is_empty() {
        return Ok(Collection::empty());
    }
    let item = require_singleton(operand, "unary operator")?;
    let negated = match (op, item) {
        (UnaryOperator::Plus, FhirPathValue::Integer(_))
        | (UnaryOperator::Plus, FhirPathValue::Decimal(_))
        | (UnaryOperator::Plus, FhirPathValue::Quantity(_)) => item.clone(),
        (UnaryOperator::Minus, FhirPathValue::Integer(i)) => FhirPathValue::Integer(-i),
        (UnaryOperator::Minus, FhirPathValue::Decimal(d)) => FhirPathValue::Decimal(-d),
        (UnaryOperator::Minus, FhirPathValue::Quantity(q)) => {
            FhirPathValue::Quantity(q.scale(rust_decimal::Decimal::NEGATIVE_ONE))
        }
        _ => return Err(EvaluationError::type_error("number", item.type_name())),
    };
    Ok(Collection::singleton_of(negated))
}

/// The single item of a non-empty collection, erroring on more than one
pub fn require_singleton<'a>(
    collection: &'a Collection,
    operation: &str,
) -> EvaluationResult<&'a FhirPathValue> {
    collection
        .singleton()
        .ok_or_else(|| EvaluationError::SingletonRequired {
            function: operation.to_string(),
            size: collection.len(),
        })
}

fn require_numeric(value: &FhirPathValue, op: BinaryOperator) -> EvaluationResult<Decimal> {
    value.as_numeric().ok_or_else(|| {
        EvaluationError::invalid(format!("{op} requires numbers, got {}", value.type_name()))
    })
}

/// Strip trailing zeros introduced by decimal division (1/1 reads back as 1)
fn normalize_decimal(d: Decimal) -> FhirPathValue {
    FhirPathValue::Decimal(d.normalize())
}

fn optional_string(collection: &Collection) -> EvaluationResult<String> {
    if collection.is_empty() {
        return Ok(String::new());
    }
    let item = require_singleton(collection, "&")?;
    item.to_string_value()
        .ok_or_else(|| EvaluationError::type_error("String", item.type_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ints(values: &[i64]) -> Collection {
        Collection::from_vec(values.iter().map(|v| FhirPathValue::Integer(*v)).collect())
    }

    #[test]
    fn test_collection_equality_rules() {
        assert_eq!(collection_equality(&ints(&[1, 2]), &ints(&[1, 2])), Some(true));
        assert_eq!(
            collection_equality(&ints(&[1, 2]), &ints(&[1, 2, 3])),
            Some(false)
        );
        assert_eq!(collection_equality(&ints(&[1, 2]), &ints(&[2, 1])), Some(false));
        assert_eq!(collection_equality(&Collection::empty(), &ints(&[1])), None);
    }

    #[test]
    fn test_divide_by_zero_is_empty() {
        let result = arithmetic(BinaryOperator::Divide, &ints(&[10]), &ints(&[0])).unwrap();
        assert!(result.is_empty());
        let result = arithmetic(BinaryOperator::Modulo, &ints(&[10]), &ints(&[0])).unwrap();
        assert!(result.is_empty());
        let result = arithmetic(BinaryOperator::IntegerDivide, &ints(&[10]), &ints(&[0])).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_division_produces_decimal() {
        let result = arithmetic(BinaryOperator::Divide, &ints(&[10]), &ints(&[4])).unwrap();
        assert_eq!(
            result.singleton().unwrap().as_numeric().unwrap().to_string(),
            "2.5"
        );
        let result = arithmetic(BinaryOperator::IntegerDivide, &ints(&[10]), &ints(&[4])).unwrap();
        assert_eq!(result.singleton(), Some(&FhirPathValue::Integer(2)));
    }

    #[test]
    fn test_string_plus_requires_strings() {
        let strings = Collection::from_json(&json!(["a"]));
        assert_eq!(
            arithmetic(BinaryOperator::Add, &strings, &strings)
                .unwrap()
                .singleton(),
            Some(&FhirPathValue::String("aa".into()))
        );
        assert!(arithmetic(BinaryOperator::Add, &strings, &ints(&[1])).is_err());
    }

    #[test]
    fn test_concatenate_treats_empty_as_blank() {
        let a = Collection::from_json(&json!(["x"]));
        let result = concatenate(&a, &Collection::empty()).unwrap();
        assert_eq!(result.singleton(), Some(&FhirPathValue::String("x".into())));
    }

    #[test]
    fn test_membership() {
        let result = membership(&ints(&[2]), &ints(&[1, 2, 3])).unwrap();
        assert_eq!(result.singleton(), Some(&FhirPathValue::Boolean(true)));
        let result = membership(&Collection::empty(), &ints(&[1])).unwrap();
        assert!(result.is_empty());
        assert!(membership(&ints(&[1, 2]), &ints(&[1])).is_err());
    }

    #[test]
    fn test_empty_propagation() {
        for op in [
            BinaryOperator::Add,
            BinaryOperator::Subtract,
            BinaryOperator::LessThan,
        ] {
            let result = match op {
                BinaryOperator::LessThan => compare(op, &Collection::empty(), &ints(&[1])),
                _ => arithmetic(op, &Collection::empty(), &ints(&[1])),
            }
            .unwrap();
            assert!(result.is_empty());
        }
    }

    #[test]
    fn test_integer_overflow_promotes_to_decimal() {
        let result =
            arithmetic(BinaryOperator::Add, &ints(&[i64::MAX]), &ints(&[1])).unwrap();
        assert!(matches!(
            result.singleton(),
            Some(FhirPathValue::Decimal(_))
        ));
    }
}
