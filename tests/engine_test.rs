//! Engine facade behavior: environment variables, user functions, the
//! trace sink, `defineVariable`, and the abort signal

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use common::{eval_json, patient};
use fhirpath_engine::{
    Collection, EnvValue, EnvironmentMap, EvaluationError, EvaluationOptions, FhirPathEngine,
    FhirPathError, FhirPathValue, UserFunction,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn test_conventional_environment_variables() {
    let p = patient();
    assert_eq!(
        eval_json("%resource.id", &p).await,
        json!(["ex"])
    );
    assert_eq!(eval_json("%rootResource.id", &p).await, json!(["ex"]));
    assert_eq!(eval_json("%context.active", &p).await, json!([true]));
    assert_eq!(
        eval_json("%ucum", &p).await,
        json!(["http://unitsofmeasure.org"])
    );
    // Absent environment variables read as empty
    assert_eq!(eval_json("%undefined", &p).await, json!([]));
}

#[tokio::test]
async fn test_caller_environment_entries() {
    let engine = FhirPathEngine::new();
    let mut env = EnvironmentMap::default();
    env.insert(
        "threshold".to_string(),
        EnvValue::item(FhirPathValue::Integer(2)),
    );
    let result = engine
        .evaluate_with_environment("name.given.count() > %threshold", &patient(), env)
        .await
        .unwrap();
    assert_eq!(result.to_json(), json!([true]));
}

#[tokio::test]
async fn test_user_function_checked_before_builtins() {
    let mut options = EvaluationOptions::default();
    options.user_functions.insert(
        "double".to_string(),
        UserFunction::new(0..=0, false, |input, _args| {
            Ok(input
                .iter()
                .map(|item| match item.as_integer() {
                    Some(i) => FhirPathValue::Integer(i * 2),
                    None => item.clone(),
                })
                .collect())
        }),
    );
    let engine = FhirPathEngine::with_options(options);
    let result = engine
        .evaluate("(1 | 2 | 3).double()", &json!({}))
        .await
        .unwrap();
    assert_eq!(result.to_json(), json!([2, 4, 6]));

    // A non-nullable user function short-circuits on empty input
    let result = engine.evaluate("{}.double()", &json!({})).await.unwrap();
    assert_eq!(result.to_json(), json!([]));
}

#[tokio::test]
async fn test_trace_sink_receives_values() {
    let captured: Arc<Mutex<Vec<(String, serde_json::Value)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&captured);

    let mut options = EvaluationOptions::default();
    options.trace = Some(Arc::new(move |label: &str, value: &Collection| {
        sink.lock().push((label.to_string(), value.to_json()));
    }));
    let engine = FhirPathEngine::with_options(options);

    let result = engine
        .evaluate("name.given.trace('givens').count()", &patient())
        .await
        .unwrap();
    assert_eq!(result.to_json(), json!([3]));

    let captured = captured.lock();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].0, "givens");
    assert_eq!(captured[0].1, json!(["John", "James", "Johnny"]));
}

#[tokio::test]
async fn test_trace_with_projection() {
    let captured: Arc<Mutex<Vec<(String, serde_json::Value)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&captured);

    let mut options = EvaluationOptions::default();
    options.trace = Some(Arc::new(move |label: &str, value: &Collection| {
        sink.lock().push((label.to_string(), value.to_json()));
    }));
    let engine = FhirPathEngine::with_options(options);

    // The projection is what reaches the sink; the input flows onward
    let result = engine
        .evaluate("name.trace('uses', use).given.count()", &patient())
        .await
        .unwrap();
    assert_eq!(result.to_json(), json!([3]));
    assert_eq!(captured.lock()[0].1, json!(["official", "nickname"]));
}

#[tokio::test]
async fn test_define_variable() {
    let p = patient();
    assert_eq!(
        eval_json("defineVariable('x', name.given.first()).select(%x)", &p).await,
        json!(["John"])
    );
    // Bare identifiers resolve through defined variables too
    assert_eq!(
        eval_json("defineVariable('x', 5).select(x + 1)", &p).await,
        json!([6])
    );
    // Without a value expression the input itself is bound
    assert_eq!(
        eval_json("name.given.defineVariable('g').select(%g).count()", &p).await,
        json!([9])
    );
    // A binding shadows member navigation for the rest of the expression
    assert_eq!(
        eval_json("Patient.defineVariable('given', 'x').given", &p).await,
        json!(["x"])
    );
    assert_eq!(
        eval_json("defineVariable('id', 'shadowed').name.defineVariable('n').id", &p).await,
        json!(["shadowed"])
    );
}

#[tokio::test]
async fn test_define_variable_cannot_shadow_system_names() {
    let err = FhirPathEngine::new()
        .evaluate("defineVariable('resource', 1)", &patient())
        .await
        .unwrap_err();
    assert!(matches!(err, FhirPathError::Evaluation(_)));
}

#[tokio::test]
async fn test_abort_signal_stops_evaluation() {
    let signal = Arc::new(AtomicBool::new(true));
    let options = EvaluationOptions {
        signal: Some(Arc::clone(&signal)),
        ..Default::default()
    };
    let engine = FhirPathEngine::with_options(options);
    let err = engine
        .evaluate("name.given.count()", &patient())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FhirPathError::Evaluation(EvaluationError::Aborted)
    ));

    signal.store(false, Ordering::Relaxed);
    assert!(engine.evaluate("name.given.count()", &patient()).await.is_ok());
}

#[tokio::test]
async fn test_unknown_function_is_an_error() {
    let err = FhirPathEngine::new()
        .evaluate("name.frobnicate()", &patient())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FhirPathError::Evaluation(EvaluationError::UnknownFunction { .. })
    ));
}

#[tokio::test]
async fn test_evaluate_to_json() {
    let engine = FhirPathEngine::new();
    let result = engine
        .evaluate_to_json("name.given", &patient())
        .await
        .unwrap();
    assert_eq!(result, json!(["John", "James", "Johnny"]));
}

#[tokio::test]
async fn test_registry_metadata_surface() {
    let engine = FhirPathEngine::new();
    let names: Vec<&str> = engine.registry().function_names().collect();
    assert!(names.contains(&"where"));
    assert!(names.contains(&"aggregate"));
    let meta = engine.registry().get("substring").unwrap();
    assert_eq!((meta.min_args, meta.max_args), (1, 2));
}
