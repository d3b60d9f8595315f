//! REST client for the fal.ai queue HTTP endpoints.
//!
//! Wraps the queue API (submission with webhook registration, status
//! polling, result retrieval) using [`reqwest`].

use serde::Deserialize;

/// HTTP client for the fal.ai queue.
pub struct FalQueueClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// Response returned by the queue after successfully accepting a request.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Provider-assigned identifier correlating all later callbacks and
    /// polls to this request.
    pub request_id: String,
}

/// Raw body of the `GET .../requests/{id}/status` endpoint.
#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
}

/// A media artifact reference inside a result payload.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaRef {
    /// Provider-hosted URL to fetch the artifact from.
    pub url: String,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

/// Result object produced by a completed generation.
///
/// The shape varies per model; image-to-video models return a `video`
/// entry, image models an `image` entry. Unknown extra fields are
/// accepted and ignored. Owned entirely by the caller after retrieval.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultPayload {
    #[serde(default)]
    pub video: Option<MediaRef>,
    #[serde(default)]
    pub image: Option<MediaRef>,
    /// Provider-assigned seed, numeric or string depending on the model.
    #[serde(default)]
    pub seed: Option<serde_json::Value>,
}

impl ResultPayload {
    /// The artifact reference, preferring video output over image output.
    pub fn artifact(&self) -> Option<&MediaRef> {
        self.video.as_ref().or(self.image.as_ref())
    }

    /// The seed normalized to a string, if the model reported one.
    pub fn seed_string(&self) -> Option<String> {
        match &self.seed {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Outcome of a synchronous status poll.
#[derive(Debug)]
pub enum QueueStatus {
    /// Queued or actively executing; merely slow, not stuck.
    InProgress,
    /// Finished with a result payload.
    Completed(ResultPayload),
    /// Finished with a provider-reported error message.
    Failed(String),
}

/// Errors from the fal queue REST layer.
#[derive(Debug, thiserror::Error)]
pub enum FalApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The queue returned a non-2xx status code.
    #[error("fal queue error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The queue returned a body this client does not understand.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl FalQueueClient {
    /// Create a new client for the fal queue.
    ///
    /// * `base_url` - queue base URL, e.g. `https://queue.fal.run`.
    /// * `api_key`  - account API key, sent as `Authorization: Key <key>`.
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling across components).
    pub fn with_client(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    /// Submit a generation request to the queue.
    ///
    /// Sends `POST {base}/{model_id}` with the model input as the JSON
    /// body, registering `webhook_url` for the completion callback.
    /// Returns the provider-assigned request id.
    pub async fn submit(
        &self,
        model_id: &str,
        input: &serde_json::Value,
        webhook_url: &str,
    ) -> Result<String, FalApiError> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, model_id))
            .query(&[("fal_webhook", webhook_url)])
            .header("Authorization", format!("Key {}", self.api_key))
            .json(input)
            .send()
            .await?;

        let submit: SubmitResponse = Self::parse_response(response).await?;

        tracing::info!(
            model_id,
            request_id = %submit.request_id,
            "Submitted request to fal queue"
        );

        Ok(submit.request_id)
    }

    /// Poll the current state of a queued request.
    ///
    /// `IN_QUEUE` and `IN_PROGRESS` map to [`QueueStatus::InProgress`].
    /// On `COMPLETED` the result body is fetched in a follow-up request;
    /// a result carrying an error detail maps to [`QueueStatus::Failed`].
    pub async fn status(
        &self,
        model_id: &str,
        request_id: &str,
    ) -> Result<QueueStatus, FalApiError> {
        let response = self
            .client
            .get(format!(
                "{}/{}/requests/{}/status",
                self.base_url, model_id, request_id
            ))
            .header("Authorization", format!("Key {}", self.api_key))
            .send()
            .await?;

        let status: StatusResponse = Self::parse_response(response).await?;

        match status.status.as_str() {
            "IN_QUEUE" | "IN_PROGRESS" => Ok(QueueStatus::InProgress),
            "COMPLETED" => self.fetch_result(model_id, request_id).await,
            other => Err(FalApiError::Protocol(format!(
                "Unknown queue status: {other}"
            ))),
        }
    }

    /// Fetch the result body of a completed request and classify it.
    async fn fetch_result(
        &self,
        model_id: &str,
        request_id: &str,
    ) -> Result<QueueStatus, FalApiError> {
        let response = self
            .client
            .get(format!(
                "{}/{}/requests/{}",
                self.base_url, model_id, request_id
            ))
            .header("Authorization", format!("Key {}", self.api_key))
            .send()
            .await?;

        let body: serde_json::Value = Self::parse_response(response).await?;

        // Failed executions report their error under `detail`.
        if let Some(detail) = body.get("detail") {
            let message = match detail {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Ok(QueueStatus::Failed(message));
        }

        let payload: ResultPayload = serde_json::from_value(body)
            .map_err(|e| FalApiError::Protocol(format!("Unparseable result payload: {e}")))?;

        Ok(QueueStatus::Completed(payload))
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`FalApiError::Api`] containing
    /// the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, FalApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(FalApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, FalApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
