//! Terminology and resolver contracts with mock services

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use fhirpath_engine::evaluator::EvaluationResult;
use fhirpath_engine::{
    AsyncMode, Coded, EvaluationError, EvaluationOptions, FhirPathEngine, FhirPathError,
    ReferenceResolver, TerminologyService,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

/// A value-set service that accepts only the code `male`
struct MockTerminology;

#[async_trait]
impl TerminologyService for MockTerminology {
    async fn member_of(&self, coded: &Coded, _value_set_url: &str) -> EvaluationResult<bool> {
        Ok(coded.code == "male")
    }

    async fn call(&self, operation: &str, _args: &[Value]) -> EvaluationResult<Value> {
        Ok(json!({
            "resourceType": "Parameters",
            "parameter": [{"name": "operation", "valueString": operation}]
        }))
    }
}

struct MockResolver;

#[async_trait]
impl ReferenceResolver for MockResolver {
    async fn resolve(&self, reference: &str) -> EvaluationResult<Option<Value>> {
        if reference == "Patient/p1" {
            Ok(Some(json!({"resourceType": "Patient", "id": "p1"})))
        } else {
            Ok(None)
        }
    }
}

fn engine_with_terminology(mode: AsyncMode) -> FhirPathEngine {
    let options = EvaluationOptions {
        terminology: Some(Arc::new(MockTerminology)),
        async_mode: mode,
        ..Default::default()
    };
    FhirPathEngine::with_options(options)
}

#[tokio::test]
async fn test_member_of_with_service() {
    let engine = engine_with_terminology(AsyncMode::On);
    let input = json!({"gender": "male", "status": "draft"});

    let result = engine
        .evaluate("gender.memberOf('http://hl7.org/fhir/ValueSet/administrative-gender')", &input)
        .await
        .unwrap();
    assert_eq!(result.to_json(), json!([true]));

    let result = engine
        .evaluate("status.memberOf('http://hl7.org/fhir/ValueSet/administrative-gender')", &input)
        .await
        .unwrap();
    assert_eq!(result.to_json(), json!([false]));

    // Empty input yields empty, not false
    let result = engine
        .evaluate("missing.memberOf('http://x')", &input)
        .await
        .unwrap();
    assert_eq!(result.to_json(), json!([]));
}

#[tokio::test]
async fn test_member_of_accepts_codings() {
    let engine = engine_with_terminology(AsyncMode::On);
    let input = json!({
        "code": {
            "coding": [{"system": "http://hl7.org/fhir/administrative-gender", "code": "male"}]
        }
    });
    let result = engine
        .evaluate("code.memberOf('http://x')", &input)
        .await
        .unwrap();
    assert_eq!(result.to_json(), json!([true]));
}

#[tokio::test]
async fn test_member_of_requires_async_mode() {
    let engine = engine_with_terminology(AsyncMode::Off);
    let err = engine
        .evaluate("gender.memberOf('http://x')", &json!({"gender": "male"}))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FhirPathError::Evaluation(EvaluationError::AsyncDisabled { .. })
    ));
}

#[tokio::test]
async fn test_member_of_without_service_is_empty() {
    let engine = FhirPathEngine::new();
    let result = engine
        .evaluate("gender.memberOf('http://x')", &json!({"gender": "male"}))
        .await
        .unwrap();
    assert_eq!(result.to_json(), json!([]));
}

#[tokio::test]
async fn test_terminologies_proxy_dispatch() {
    let engine = engine_with_terminology(AsyncMode::On);
    let input = json!({"gender": "male"});

    let result = engine
        .evaluate("%terminologies.memberOf(gender, 'http://x')", &input)
        .await
        .unwrap();
    assert_eq!(result.to_json(), json!([true]));

    let result = engine
        .evaluate(
            "%terminologies.expand('http://x').parameter.valueString",
            &input,
        )
        .await
        .unwrap();
    assert_eq!(result.to_json(), json!(["expand"]));
}

#[tokio::test]
async fn test_terminologies_proxy_requires_async_mode() {
    let engine = engine_with_terminology(AsyncMode::Off);
    let err = engine
        .evaluate("%terminologies.expand('http://x')", &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FhirPathError::Evaluation(EvaluationError::AsyncDisabled { .. })
    ));
}

#[tokio::test]
async fn test_resolve_with_injected_resolver() {
    let options = EvaluationOptions {
        resolver: Some(Arc::new(MockResolver)),
        async_mode: AsyncMode::On,
        ..Default::default()
    };
    let engine = FhirPathEngine::with_options(options);
    let input = json!({"subject": {"reference": "Patient/p1"}});

    let result = engine
        .evaluate("subject.resolve().id", &input)
        .await
        .unwrap();
    assert_eq!(result.to_json(), json!(["p1"]));

    // Unknown references resolve to nothing
    let input = json!({"subject": {"reference": "Patient/unknown"}});
    let result = engine.evaluate("subject.resolve()", &input).await.unwrap();
    assert_eq!(result.to_json(), json!([]));
}

#[tokio::test]
async fn test_resolver_requires_async_mode() {
    let options = EvaluationOptions {
        resolver: Some(Arc::new(MockResolver)),
        ..Default::default()
    };
    let engine = FhirPathEngine::with_options(options);
    let err = engine
        .evaluate("subject.resolve()", &json!({"subject": {"reference": "Patient/p1"}}))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FhirPathError::Evaluation(EvaluationError::AsyncDisabled { .. })
    ));
}

#[tokio::test]
async fn test_resolve_falls_back_to_bundle() {
    // The Bundle lookup is synchronous and works without async mode
    let bundle = json!({
        "resourceType": "Bundle",
        "entry": [
            {
                "fullUrl": "urn:uuid:1234",
                "resource": {"resourceType": "Patient", "id": "p1"}
            },
            {
                "resource": {
                    "resourceType": "Observation",
                    "id": "o1",
                    "subject": {"reference": "Patient/p1"}
                }
            }
        ]
    });
    let engine = FhirPathEngine::new();

    let result = engine
        .evaluate("'Patient/p1'.resolve().id", &bundle)
        .await
        .unwrap();
    assert_eq!(result.to_json(), json!(["p1"]));

    let result = engine
        .evaluate("'urn:uuid:1234'.resolve().id", &bundle)
        .await
        .unwrap();
    assert_eq!(result.to_json(), json!(["p1"]));

    let result = engine
        .evaluate(
            "entry.resource.where(id = 'o1').subject.resolve().id",
            &bundle,
        )
        .await
        .unwrap();
    assert_eq!(result.to_json(), json!(["p1"]));

    // No resolver, no matching entry: empty
    let result = engine
        .evaluate("'Patient/nope'.resolve()", &bundle)
        .await
        .unwrap();
    assert_eq!(result.to_json(), json!([]));
}
