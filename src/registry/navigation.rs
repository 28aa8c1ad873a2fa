//! Tree navigation: `children()` and `descendants()`

use crate::evaluator::engine::Evaluator;
use crate::evaluator::EvaluationResult;
use crate::model::{Collection, FhirPathValue};

/// `children()`: the immediate child values of each item, in order.
/// Underscore-prefixed sibling keys are skipped; arrays splice.
pub fn children(input: &Collection) -> Collection {
    let mut out = Vec::new();
    for item in input.iter() {
        if let FhirPathValue::Resource(resource) = item {
            for value in resource.children() {
                Collection::splice_json(value, &mut out);
            }
        }
    }
    Collection::from_vec(out)
}

/// `descendants()`: `children()` applied transitively, breadth-first.
/// JSON documents are acyclic, so the walk terminates; the abort flag is
/// still honored between levels.
pub fn descendants(ev: &Evaluator, input: &Collection) -> EvaluationResult<Collection> {
    let mut out = Vec::new();
    let mut frontier = children(input);
    while !frontier.is_empty() {
        ev.options().check_abort()?;
        out.extend(frontier.iter().cloned());
        frontier = children(&frontier);
    }
    Ok(Collection::from_vec(out))
}
