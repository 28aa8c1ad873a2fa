//! Terminology service contract
//!
//! `memberOf(valueSetUrl)` and the `%terminologies` methods forward to an
//! injected [`TerminologyService`]. A default HTTP client can be composed
//! from a server URL; callers with their own infrastructure implement the
//! trait directly. All service calls are suspension points and require
//! async mode.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Arc;

use crate::evaluator::context::HostCallable;
use crate::evaluator::{EvaluationError, EvaluationResult};
use crate::model::{Collection, FhirPathValue};

/// A code prepared for a terminology call
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Coded {
    /// Code system URL
    pub system: Option<String>,
    /// The code itself
    pub code: String,
    /// Code system version
    pub version: Option<String>,
}

impl Coded {
    /// Extract a coded value from a plain code string, a `Coding`, or the
    /// first coding of a `CodeableConcept`
    pub fn from_value(value: &FhirPathValue) -> Option<Coded> {
        match value {
            FhirPathValue::String(code) => Some(Coded {
                system: None,
                code: code.clone(),
                version: None,
            }),
            FhirPathValue::Resource(resource) => Self::from_json(resource.as_json()),
            _ => None,
        }
    }

    fn from_json(value: &Value) -> Option<Coded> {
        // CodeableConcept: use the first coding
        if let Some(codings) = value.get("coding").and_then(Value::as_array) {
            return codings.first().and_then(Self::from_json);
        }
        let code = value.get("code")?.as_str()?.to_string();
        Some(Coded {
            system: value
                .get("system")
                .and_then(Value::as_str)
                .map(str::to_string),
            code,
            version: value
                .get("version")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

/// Injected terminology service interface
#[async_trait]
pub trait TerminologyService: Send + Sync {
    /// Whether a coded value is a member of the value set
    async fn member_of(&self, coded: &Coded, value_set_url: &str) -> EvaluationResult<bool>;

    /// Forward a `%terminologies` operation (`expand`, `lookup`,
    /// `validateVS`, `validateCS`, `subsumes`, `translate`) with its
    /// arguments rendered as JSON
    async fn call(&self, operation: &str, args: &[Value]) -> EvaluationResult<Value>;
}

/// Default terminology client speaking the FHIR terminology REST API
pub struct HttpTerminologyService {
    client: reqwest::Client,
    base_url: String,
    headers: FxHashMap<String, FxHashMap<String, String>>,
}

impl HttpTerminologyService {
    /// Create a client for `base_url`, with per-server extra headers
    /// (outer key: server URL, inner map: header name to value)
    pub fn new(
        base_url: impl Into<String>,
        headers: FxHashMap<String, FxHashMap<String, String>>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            headers,
        }
    }

    fn request(&self, path: &str, query: &[(&str, &str)]) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .get(format!("{}/{}", self.base_url, path))
            .query(query);
        if let Some(extra) = self.headers.get(&self.base_url) {
            for (name, value) in extra {
                builder = builder.header(name, value);
            }
        }
        builder
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> EvaluationResult<Value> {
        let response = self
            .request(path, query)
            .send()
            .await
            .map_err(|e| EvaluationError::Service {
                message: e.to_string(),
            })?;
        response
            .error_for_status()
            .map_err(|e| EvaluationError::Service {
                message: e.to_string(),
            })?
            .json()
            .await
            .map_err(|e| EvaluationError::Service {
                message: e.to_string(),
            })
    }
}

/// Read the boolean `result` parameter of a Parameters resource
fn parameters_result(parameters: &Value) -> Option<bool> {
    parameters
        .get("parameter")?
        .as_array()?
        .iter()
        .find(|p| p.get("name").and_then(Value::as_str) == Some("result"))?
        .get("valueBoolean")?
        .as_bool()
}

fn string_arg(args: &[Value], index: usize) -> Option<&str> {
    args.get(index).and_then(Value::as_str)
}

#[async_trait]
impl TerminologyService for HttpTerminologyService {
    async fn member_of(&self, coded: &Coded, value_set_url: &str) -> EvaluationResult<bool> {
        let mut query: Vec<(&str, &str)> =
            vec![("url", value_set_url), ("code", coded.code.as_str())];
        if let Some(system) = &coded.system {
            query.push(("system", system));
        }
        if let Some(version) = &coded.version {
            query.push(("systemVersion", version));
        }
        let parameters = self.get_json("ValueSet/$validate-code", &query).await?;
        Ok(parameters_result(&parameters).unwrap_or(false))
    }

    async fn call(&self, operation: &str, args: &[Value]) -> EvaluationResult<Value> {
        match operation {
            "expand" => {
                let url = string_arg(args, 0).ok_or_else(|| EvaluationError::InvalidArgument {
                    function: "expand".into(),
                    message: "expected a value set URL".into(),
                })?;
                self.get_json("ValueSet/$expand", &[("url", url)]).await
            }
            "lookup" => {
                let coded = args.first().cloned().unwrap_or(Value::Null);
                let coded = Coded::from_json_value(&coded).ok_or_else(|| {
                    EvaluationError::InvalidArgument {
                        function: "lookup".into(),
                        message: "expected a coded value".into(),
                    }
                })?;
                let mut query: Vec<(&str, &str)> = vec![("code", coded.code.as_str())];
                if let Some(system) = &coded.system {
                    query.push(("system", system));
                }
                self.get_json("CodeSystem/$lookup", &query).await
            }
            "validateVS" => {
                let url = string_arg(args, 0).unwrap_or_default();
                let coded = args.get(1).cloned().unwrap_or(Value::Null);
                let coded = Coded::from_json_value(&coded).unwrap_or_default();
                let mut query: Vec<(&str, &str)> =
                    vec![("url", url), ("code", coded.code.as_str())];
                if let Some(system) = &coded.system {
                    query.push(("system", system));
                }
                self.get_json("ValueSet/$validate-code", &query).await
            }
            "validateCS" => {
                let url = string_arg(args, 0).unwrap_or_default();
                let coded = args.get(1).cloned().unwrap_or(Value::Null);
                let coded = Coded::from_json_value(&coded).unwrap_or_default();
                let query: Vec<(&str, &str)> = vec![("url", url), ("code", coded.code.as_str())];
                self.get_json("CodeSystem/$validate-code", &query).await
            }
            "subsumes" => {
                let system = string_arg(args, 0).unwrap_or_default();
                let a = Coded::from_json_value(args.get(1).unwrap_or(&Value::Null))
                    .unwrap_or_default();
                let b = Coded::from_json_value(args.get(2).unwrap_or(&Value::Null))
                    .unwrap_or_default();
                self.get_json(
                    "CodeSystem/$subsumes",
                    &[
                        ("system", system),
                        ("codeA", a.code.as_str()),
                        ("codeB", b.code.as_str()),
                    ],
                )
                .await
            }
            "translate" => {
                let url = string_arg(args, 0).unwrap_or_default();
                let coded = Coded::from_json_value(args.get(1).unwrap_or(&Value::Null))
                    .unwrap_or_default();
                let mut query: Vec<(&str, &str)> =
                    vec![("url", url), ("code", coded.code.as_str())];
                if let Some(system) = &coded.system {
                    query.push(("system", system));
                }
                self.get_json("ConceptMap/$translate", &query).await
            }
            other => Err(EvaluationError::InvalidOperation {
                message: format!("unknown terminology operation: {other}"),
            }),
        }
    }
}

impl Coded {
    /// Extract a coded value from a JSON value (string, Coding or
    /// CodeableConcept rendering)
    pub fn from_json_value(value: &Value) -> Option<Coded> {
        match value {
            Value::String(code) => Some(Coded {
                system: None,
                code: code.clone(),
                version: None,
            }),
            Value::Object(_) => Self::from_json(value),
            _ => None,
        }
    }
}

/// The `%terminologies` host object: dispatches method calls to the service
pub struct TerminologiesProxy {
    service: Arc<dyn TerminologyService>,
}

impl TerminologiesProxy {
    /// Wrap a service
    pub fn new(service: Arc<dyn TerminologyService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl HostCallable for TerminologiesProxy {
    async fn invoke(&self, method: &str, args: &[Collection]) -> EvaluationResult<Collection> {
        if method == "memberOf" {
            let Some(item) = args.first().and_then(|c| c.singleton()) else {
                return Ok(Collection::empty());
            };
            let Some(coded) = Coded::from_value(item) else {
                return Ok(Collection::empty());
            };
            let Some(url) = args.get(1).and_then(|c| c.singleton()).and_then(|v| v.as_string())
            else {
                return Ok(Collection::empty());
            };
            let result = self.service.member_of(&coded, url).await?;
            return Ok(Collection::singleton_of(FhirPathValue::Boolean(result)));
        }

        let json_args: Vec<Value> = args
            .iter()
            .map(|c| match c.singleton() {
                Some(item) => item.to_json(),
                None => Value::Null,
            })
            .collect();
        let result = self.service.call(method, &json_args).await?;
        Ok(Collection::from_json(&result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coded_from_plain_code() {
        let coded = Coded::from_value(&FhirPathValue::String("male".into())).unwrap();
        assert_eq!(coded.code, "male");
        assert_eq!(coded.system, None);
    }

    #[test]
    fn test_coded_from_coding() {
        let value = Collection::from_json(&json!({
            "system": "http://loinc.org",
            "code": "1234-5",
            "version": "2.77"
        }));
        let coded = Coded::from_value(value.singleton().unwrap()).unwrap();
        assert_eq!(coded.system.as_deref(), Some("http://loinc.org"));
        assert_eq!(coded.code, "1234-5");
        assert_eq!(coded.version.as_deref(), Some("2.77"));
    }

    #[test]
    fn test_coded_from_codeable_concept_takes_first_coding() {
        let value = Collection::from_json(&json!({
            "coding": [
                {"system": "http://loinc.org", "code": "first"},
                {"system": "http://snomed.info/sct", "code": "second"}
            ],
            "text": "something"
        }));
        let coded = Coded::from_value(value.singleton().unwrap()).unwrap();
        assert_eq!(coded.code, "first");
    }

    #[test]
    fn test_parameters_result() {
        let params = json!({
            "resourceType": "Parameters",
            "parameter": [
                {"name": "message", "valueString": "ok"},
                {"name": "result", "valueBoolean": true}
            ]
        });
        assert_eq!(parameters_result(&params), Some(true));
        assert_eq!(parameters_result(&json!({})), None);
    }
}
