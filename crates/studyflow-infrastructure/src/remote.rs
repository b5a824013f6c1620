//! Remote write endpoint boundary.
//!
//! The pipeline talks to the server through a single operation-dispatch
//! endpoint that accepts `{operation, ...body}` and answers
//! `{"success": true, ...}` or `{"error": "<code>"}`. Errors are classified
//! into the pipeline's taxonomy here, so callers and the durable queue can
//! branch without inspecting wire details.

use async_trait::async_trait;
use serde_json::Value;
use studyflow_core::error::{Result, StudyError, ALREADY_COMPLETED};

/// The remote write endpoint consumed by the submission client and the
/// durable queue's drain pass.
#[async_trait]
pub trait RemoteEndpoint: Send + Sync {
    /// Invokes `operation` with the given JSON body.
    ///
    /// # Errors
    ///
    /// - `Transport` for network failures and 5xx outcomes (retryable)
    /// - `Validation` for malformed/unknown operations (never retried)
    /// - `NotFound` when the referenced session does not exist
    /// - `InvalidTransition` for illegal state-machine moves, including the
    ///   idempotent-completion rejection
    async fn call(&self, operation: &str, body: &Value) -> Result<Value>;
}

/// Production endpoint speaking the wire protocol over HTTP.
pub struct HttpRemoteEndpoint {
    client: reqwest::Client,
    url: String,
}

impl HttpRemoteEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl RemoteEndpoint for HttpRemoteEndpoint {
    async fn call(&self, operation: &str, body: &Value) -> Result<Value> {
        let mut payload = match body {
            Value::Object(map) => map.clone(),
            Value::Null => serde_json::Map::new(),
            _ => {
                return Err(StudyError::validation(
                    "operation body must be a JSON object",
                ))
            }
        };
        payload.insert("operation".to_string(), Value::String(operation.into()));

        let response = self
            .client
            .post(&self.url)
            .json(&Value::Object(payload))
            .send()
            .await
            .map_err(|e| StudyError::transport(format!("{operation}: {e}")))?;

        let status = response.status();
        let value: Value = response
            .json()
            .await
            .map_err(|e| StudyError::transport(format!("{operation}: invalid response: {e}")))?;

        if status.is_server_error() {
            return Err(StudyError::transport(format!(
                "{operation}: server error {status}"
            )));
        }

        if value.get("success").and_then(Value::as_bool) == Some(true) {
            return Ok(value);
        }

        let code = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        Err(classify_error_code(operation, code))
    }
}

/// Maps a wire error code into the pipeline error taxonomy.
pub fn classify_error_code(operation: &str, code: &str) -> StudyError {
    match code {
        "not_found" => StudyError::not_found("session", operation),
        "already_completed" => {
            StudyError::invalid_transition("completed", "completed", ALREADY_COMPLETED)
        }
        "invalid_transition" => {
            StudyError::invalid_transition("unknown", "unknown", format!("{operation} rejected"))
        }
        other => StudyError::validation(format!("{operation}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_map_to_taxonomy() {
        assert!(classify_error_code("completeSession", "not_found").is_not_found());
        assert!(classify_error_code("completeSession", "already_completed").is_already_completed());
        assert!(classify_error_code("updateMode", "invalid_transition").is_invalid_transition());
        assert!(classify_error_code("saveResponses", "malformed body").is_validation());
    }
}
