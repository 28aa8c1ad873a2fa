//! Combining functions: `combine`, `union`

use crate::model::Collection;

/// `combine(other)`: concatenation, duplicates kept
pub fn combine(input: &Collection, other: &Collection) -> Collection {
    input.concat(other)
}

/// `union(other)`: concatenation deduplicated in first-occurrence order
pub fn union(input: &Collection, other: &Collection) -> Collection {
    input.union(other)
}
