//! Dynamic resource values backed by a shared JSON tree
//!
//! The input document is schema-free: properties are discovered at
//! evaluation time by scanning the underlying `serde_json` object. The tree
//! is held behind an `Arc` so navigation hands out cheap references and the
//! same input can serve concurrent evaluations.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A FHIR resource or complex element reference
#[derive(Clone)]
pub struct FhirResource {
    json: Arc<Value>,
}

impl FhirResource {
    /// Wrap an owned JSON value
    pub fn from_json(value: Value) -> Self {
        Self {
            json: Arc::new(value),
        }
    }

    /// Wrap an already-shared JSON value
    pub fn from_shared(json: Arc<Value>) -> Self {
        Self { json }
    }

    /// Borrow the underlying JSON
    pub fn as_json(&self) -> &Value {
        &self.json
    }

    /// Clone out the underlying JSON
    pub fn to_json(&self) -> Value {
        (*self.json).clone()
    }

    /// Share the underlying JSON without cloning the tree
    pub fn shared(&self) -> Arc<Value> {
        Arc::clone(&self.json)
    }

    /// The `resourceType` field, when present
    pub fn resource_type(&self) -> Option<&str> {
        self.json.get("resourceType").and_then(Value::as_str)
    }

    /// The `id` field, when present
    pub fn id(&self) -> Option<&str> {
        self.json.get("id").and_then(Value::as_str)
    }

    /// Direct property lookup
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.json.get(name)
    }

    /// Keys matching the `value[x]` choice-type convention for `name`:
    /// every property whose key starts with `name` and whose remainder
    /// begins with an uppercase letter (`valueQuantity` for `value`).
    pub fn polymorphic_properties<'a>(&'a self, name: &str) -> Vec<(&'a str, &'a Value)> {
        let Some(obj) = self.json.as_object() else {
            return Vec::new();
        };
        obj.iter()
            .filter(|(key, _)| {
                key.len() > name.len()
                    && key.starts_with(name)
                    && key[name.len()..]
                        .chars()
                        .next()
                        .is_some_and(|c| c.is_ascii_uppercase())
            })
            .map(|(key, value)| (key.as_str(), value))
            .collect()
    }

    /// Immediate child values, skipping underscore-prefixed sibling keys
    pub fn children(&self) -> Vec<&Value> {
        match self.json.as_object() {
            Some(obj) => obj
                .iter()
                .filter(|(key, _)| !key.starts_with('_'))
                .map(|(_, value)| value)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Whether this resource is an object (as opposed to a stray scalar)
    pub fn is_object(&self) -> bool {
        self.json.is_object()
    }
}

impl PartialEq for FhirResource {
    fn eq(&self, other: &Self) -> bool {
        // Deep structural equality: key sets and values recursively,
        // array elements in order
        Arc::ptr_eq(&self.json, &other.json) || *self.json == *other.json
    }
}

impl fmt::Debug for FhirResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resource({})", self.json)
    }
}

impl fmt::Display for FhirResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_polymorphic_lookup() {
        let r = FhirResource::from_json(json!({
            "valueQuantity": {"value": 5, "unit": "mg"},
            "valueless": true,
            "value": "plain"
        }));
        let polys = r.polymorphic_properties("value");
        assert_eq!(polys.len(), 1);
        assert_eq!(polys[0].0, "valueQuantity");
        assert!(r.property("value").is_some());
    }

    #[test]
    fn test_children_skip_underscore() {
        let r = FhirResource::from_json(json!({
            "a": 1,
            "_a": {"extension": []},
            "b": [2, 3]
        }));
        assert_eq!(r.children().len(), 2);
    }

    #[test]
    fn test_structural_equality() {
        let a = FhirResource::from_json(json!({"x": 1, "y": [1, 2]}));
        let b = FhirResource::from_json(json!({"y": [1, 2], "x": 1}));
        let c = FhirResource::from_json(json!({"x": 1, "y": [2, 1]}));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
