#![allow(dead_code)]

use fhirpath_engine::{Collection, FhirPathEngine};
use serde_json::{Value, json};

/// The patient fixture used across the evaluation tests
pub fn patient() -> Value {
    json!({
        "resourceType": "Patient",
        "id": "ex",
        "active": true,
        "name": [
            {"use": "official", "family": "Doe", "given": ["John", "James"]},
            {"use": "nickname", "given": ["Johnny"]}
        ],
        "telecom": [
            {"system": "phone", "value": "555-1234"},
            {"system": "email", "value": "j@x.com"}
        ]
    })
}

/// Evaluate an expression, panicking on any error
pub async fn eval(expression: &str, input: &Value) -> Collection {
    FhirPathEngine::new()
        .evaluate(expression, input)
        .await
        .unwrap_or_else(|e| panic!("evaluation of {expression:?} failed: {e}"))
}

/// Evaluate and render the result as a JSON array
pub async fn eval_json(expression: &str, input: &Value) -> Value {
    eval(expression, input).await.to_json()
}
