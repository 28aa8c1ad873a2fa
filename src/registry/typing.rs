//! Type tests: the `is` / `as` function forms and the shared check used
//! by the operator forms and `ofType`
//!
//! Primitive names check the runtime kind of the value. Any other name is
//! a resource-type test against `resourceType`, widened by the model's
//! type-parent graph and the caller's derived-resource predicate.

use crate::ast::{ExpressionNode, TypeSpecifier};
use crate::evaluator::engine::{Evaluator, boolean_collection};
use crate::evaluator::{EvaluationError, EvaluationOptions, EvaluationResult};
use crate::model::{Collection, FhirPathValue};

/// Whether one item is of the named type
pub fn value_is_of_type(
    item: &FhirPathValue,
    specifier: &TypeSpecifier,
    options: &EvaluationOptions,
) -> bool {
    match specifier.namespace.as_deref() {
        Some("System") => primitive_matches(item, &specifier.name),
        Some("FHIR") => {
            fhir_primitive_matches(item, &specifier.name)
                || resource_matches(item, &specifier.name, options)
        }
        Some(_) => false,
        None => {
            primitive_matches(item, &specifier.name)
                || fhir_primitive_matches(item, &specifier.name)
                || resource_matches(item, &specifier.name, options)
        }
    }
}

fn primitive_matches(item: &FhirPathValue, name: &str) -> bool {
    matches!(
        (item, name),
        (FhirPathValue::Boolean(_), "Boolean")
            | (FhirPathValue::Integer(_), "Integer")
            | (FhirPathValue::Decimal(_), "Decimal")
            | (FhirPathValue::String(_), "String")
            | (FhirPathValue::Date(_), "Date")
            | (FhirPathValue::DateTime(_), "DateTime")
            | (FhirPathValue::Time(_), "Time")
            | (FhirPathValue::Quantity(_), "Quantity")
    )
}

/// FHIR's lowercase primitive type names, mapped onto runtime kinds
fn fhir_primitive_matches(item: &FhirPathValue, name: &str) -> bool {
    match name {
        "boolean" => matches!(item, FhirPathValue::Boolean(_)),
        "integer" | "positiveInt" | "unsignedInt" => matches!(item, FhirPathValue::Integer(_)),
        "decimal" => matches!(item, FhirPathValue::Decimal(_)),
        "string" | "uri" | "url" | "canonical" | "code" | "id" | "oid" | "uuid" | "markdown"
        | "base64Binary" => matches!(item, FhirPathValue::String(_)),
        "date" => matches!(item, FhirPathValue::Date(_)),
        "dateTime" | "instant" => matches!(item, FhirPathValue::DateTime(_)),
        "time" => matches!(item, FhirPathValue::Time(_)),
        _ => false,
    }
}

fn resource_matches(item: &FhirPathValue, name: &str, options: &EvaluationOptions) -> bool {
    let Some(resource_type) = item.as_resource().and_then(|r| r.resource_type()) else {
        return false;
    };
    if resource_type == name {
        return true;
    }
    if let Some(model) = &options.model {
        if model.is_derived_from(resource_type, name) {
            return true;
        }
    }
    if let Some(predicate) = &options.is_derived_resource {
        if predicate(resource_type, name) {
            return true;
        }
    }
    false
}

fn specifier_from_arg(function: &str, arg: &ExpressionNode) -> EvaluationResult<TypeSpecifier> {
    arg.as_type_specifier()
        .ok_or_else(|| EvaluationError::InvalidArgument {
            function: function.to_string(),
            message: "expected a type specifier".to_string(),
        })
}

/// `is(Type)`: mirrors the operator form
pub fn is_fn(
    ev: &Evaluator,
    input: &Collection,
    type_arg: &ExpressionNode,
) -> EvaluationResult<Collection> {
    let specifier = specifier_from_arg("is", type_arg)?;
    if input.is_empty() {
        return Ok(Collection::empty());
    }
    let item = crate::evaluator::operators::require_singleton(input, "is")?;
    Ok(boolean_collection(value_is_of_type(
        item,
        &specifier,
        ev.options(),
    )))
}

/// `as(Type)`: mirrors the operator form, keeping the items that pass
pub fn as_fn(
    ev: &Evaluator,
    input: &Collection,
    type_arg: &ExpressionNode,
) -> EvaluationResult<Collection> {
    let specifier = specifier_from_arg("as", type_arg)?;
    Ok(input
        .iter()
        .filter(|item| value_is_of_type(item, &specifier, ev.options()))
        .cloned()
        .collect())
}
