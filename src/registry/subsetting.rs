//! Subsetting functions: `first`, `last`, `tail`, `take`, `skip`,
//! `single`, `intersect`, `exclude`

use crate::evaluator::{EvaluationError, EvaluationResult};
use crate::model::Collection;

use super::singleton_integer;

/// `first()`
pub fn first(input: &Collection) -> Collection {
    match input.first() {
        Some(item) => Collection::singleton_of(item.clone()),
        None => Collection::empty(),
    }
}

/// `last()`
pub fn last(input: &Collection) -> Collection {
    match input.last() {
        Some(item) => Collection::singleton_of(item.clone()),
        None => Collection::empty(),
    }
}

/// `tail()`: everything but the first item
pub fn tail(input: &Collection) -> Collection {
    if input.len() <= 1 {
        return Collection::empty();
    }
    Collection::from_vec(input.as_slice()[1..].to_vec())
}

/// `take(n)`: the first `n` items
pub fn take(input: &Collection, count: &Collection) -> EvaluationResult<Collection> {
    let Some(n) = singleton_integer(count, "take")? else {
        return Ok(Collection::empty());
    };
    if n <= 0 {
        return Ok(Collection::empty());
    }
    Ok(Collection::from_vec(
        input.iter().take(n as usize).cloned().collect(),
    ))
}

/// `skip(n)`: everything after the first `n` items
pub fn skip(input: &Collection, count: &Collection) -> EvaluationResult<Collection> {
    let Some(n) = singleton_integer(count, "skip")? else {
        return Ok(Collection::empty());
    };
    if n <= 0 {
        return Ok(input.clone());
    }
    Ok(Collection::from_vec(
        input.iter().skip(n as usize).cloned().collect(),
    ))
}

/// `single()`: the only item; empty stays empty, more than one is an error
pub fn single(input: &Collection) -> EvaluationResult<Collection> {
    match input.len() {
        0 => Ok(Collection::empty()),
        1 => Ok(input.clone()),
        size => Err(EvaluationError::SingletonRequired {
            function: "single".to_string(),
            size,
        }),
    }
}

/// `intersect(other)`: items present in both, deduplicated, in
/// first-occurrence order of the input
pub fn intersect(input: &Collection, other: &Collection) -> Collection {
    input
        .distinct()
        .iter()
        .filter(|item| other.contains_value(item))
        .cloned()
        .collect()
}

/// `exclude(other)`: items not present in `other`, order and duplicates kept
pub fn exclude(input: &Collection, other: &Collection) -> Collection {
    input
        .iter()
        .filter(|item| !other.contains_value(item))
        .cloned()
        .collect()
}
