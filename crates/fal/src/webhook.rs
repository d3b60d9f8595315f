//! Inbound completion-webhook payload types.
//!
//! The queue posts a callback when a request finishes. The raw payload is
//! duck-shaped JSON; [`WebhookPayload::classify`] validates it into a
//! tagged [`WebhookOutcome`] at the boundary so nothing downstream has to
//! inspect loose JSON. Unknown or malformed shapes are rejected here and
//! never reach the lifecycle engine.

use serde::Deserialize;

use crate::client::ResultPayload;

/// Raw webhook body as posted by the queue.
///
/// Unknown extra fields are tolerated; the queue adds fields over time.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    /// Correlation id issued at submission time.
    pub request_id: String,
    /// `"OK"` or `"ERROR"`.
    pub status: String,
    /// Result object, present on success.
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
    /// Error detail, present on failure. String or structured object.
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    /// Set when the queue could not serialize the result payload.
    #[serde(default)]
    pub payload_error: Option<String>,
}

/// A validated webhook outcome.
#[derive(Debug)]
pub enum WebhookOutcome {
    /// The request succeeded; the payload carries the artifact reference.
    Success(ResultPayload),
    /// The request failed with the given provider message, passed through
    /// raw and unclassified.
    Failure(String),
}

/// Rejection reasons for payloads that do not match the contract.
#[derive(Debug, thiserror::Error)]
pub enum WebhookParseError {
    #[error("Unknown webhook status: {0}")]
    UnknownStatus(String),

    #[error("Webhook reported OK without a result payload")]
    MissingPayload,

    #[error("Webhook result payload did not parse: {0}")]
    MalformedPayload(String),
}

impl WebhookPayload {
    /// Validate the raw payload into a tagged outcome.
    pub fn classify(&self) -> Result<WebhookOutcome, WebhookParseError> {
        match self.status.as_str() {
            "OK" => {
                let Some(raw) = &self.payload else {
                    return Err(WebhookParseError::MissingPayload);
                };
                let payload: ResultPayload = serde_json::from_value(raw.clone())
                    .map_err(|e| WebhookParseError::MalformedPayload(e.to_string()))?;
                Ok(WebhookOutcome::Success(payload))
            }
            "ERROR" => Ok(WebhookOutcome::Failure(self.error_message())),
            other => Err(WebhookParseError::UnknownStatus(other.to_string())),
        }
    }

    /// Best-effort provider error message for an `ERROR` callback.
    fn error_message(&self) -> String {
        match &self.error {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => self
                .payload_error
                .clone()
                .unwrap_or_else(|| "provider reported an unspecified error".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> WebhookPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn ok_with_video_payload_classifies_as_success() {
        let payload = parse(json!({
            "request_id": "req-1",
            "status": "OK",
            "payload": {
                "video": { "url": "https://cdn.example/out.mp4", "content_type": "video/mp4" },
                "seed": 42
            }
        }));

        match payload.classify().unwrap() {
            WebhookOutcome::Success(result) => {
                assert_eq!(result.artifact().unwrap().url, "https://cdn.example/out.mp4");
                assert_eq!(result.seed_string().as_deref(), Some("42"));
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn unknown_extra_fields_are_tolerated() {
        let payload = parse(json!({
            "request_id": "req-2",
            "status": "OK",
            "payload": { "video": { "url": "https://cdn.example/v.mp4" } },
            "gateway_request_id": "gw-123",
            "some_future_field": { "nested": true }
        }));
        assert!(matches!(
            payload.classify().unwrap(),
            WebhookOutcome::Success(_)
        ));
    }

    #[test]
    fn error_with_string_detail() {
        let payload = parse(json!({
            "request_id": "req-3",
            "status": "ERROR",
            "error": "NSFW content detected"
        }));
        match payload.classify().unwrap() {
            WebhookOutcome::Failure(msg) => assert_eq!(msg, "NSFW content detected"),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn error_with_structured_detail_is_stringified() {
        let payload = parse(json!({
            "request_id": "req-4",
            "status": "ERROR",
            "error": { "code": 500, "message": "worker crashed" }
        }));
        match payload.classify().unwrap() {
            WebhookOutcome::Failure(msg) => {
                assert!(msg.contains("worker crashed"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn error_without_detail_gets_a_fallback_message() {
        let payload = parse(json!({
            "request_id": "req-5",
            "status": "ERROR"
        }));
        match payload.classify().unwrap() {
            WebhookOutcome::Failure(msg) => assert!(!msg.is_empty()),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn ok_without_payload_is_rejected() {
        let payload = parse(json!({
            "request_id": "req-6",
            "status": "OK"
        }));
        assert!(matches!(
            payload.classify(),
            Err(WebhookParseError::MissingPayload)
        ));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let payload = parse(json!({
            "request_id": "req-7",
            "status": "MAYBE"
        }));
        assert!(matches!(
            payload.classify(),
            Err(WebhookParseError::UnknownStatus(_))
        ));
    }

    #[test]
    fn missing_request_id_fails_deserialization() {
        let result: Result<WebhookPayload, _> =
            serde_json::from_value(json!({ "status": "OK", "payload": {} }));
        assert!(result.is_err());
    }
}
