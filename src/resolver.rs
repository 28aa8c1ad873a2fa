//! Reference resolution
//!
//! `resolve()` consumes reference strings (or objects carrying a
//! `reference` field). An injected resolver gets the first chance; without
//! one, a Bundle bound as `%resource` is searched by `fullUrl` and by
//! `ResourceType/id`. Anything still unresolved yields nothing.

use async_trait::async_trait;
use serde_json::Value;

use crate::evaluator::EvaluationResult;

/// Injected resolver interface used by `resolve()`
#[async_trait]
pub trait ReferenceResolver: Send + Sync {
    /// Resolve one reference to a resource, `None` when unknown
    async fn resolve(&self, reference: &str) -> EvaluationResult<Option<Value>>;
}

/// Search a Bundle's entries for a reference match
///
/// A match is an entry whose `fullUrl` equals the reference, or whose
/// contained resource's `resourceType/id` equals it.
pub fn resolve_in_bundle(bundle: &Value, reference: &str) -> Option<Value> {
    if bundle.get("resourceType").and_then(Value::as_str) != Some("Bundle") {
        return None;
    }
    let entries = bundle.get("entry")?.as_array()?;
    for entry in entries {
        if entry.get("fullUrl").and_then(Value::as_str) == Some(reference) {
            if let Some(resource) = entry.get("resource") {
                return Some(resource.clone());
            }
        }
        if let Some(resource) = entry.get("resource") {
            let resource_type = resource.get("resourceType").and_then(Value::as_str);
            let id = resource.get("id").and_then(Value::as_str);
            if let (Some(resource_type), Some(id)) = (resource_type, id) {
                if reference == format!("{resource_type}/{id}") {
                    return Some(resource.clone());
                }
            }
        }
    }
    None
}

/// Extract the reference string from a `resolve()` input item:
/// either a plain string or an object with a `reference` field
pub fn reference_of(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Object(obj) => obj.get("reference").and_then(Value::as_str),
        _ => None,
    }
}
