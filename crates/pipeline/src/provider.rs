//! Seam between the pipeline and the provider queue client.
//!
//! The reconciler and the submit flow consume the queue through this
//! trait so tests can substitute a programmable fake.

use async_trait::async_trait;

use mirage_fal::{FalApiError, FalQueueClient, QueueStatus};

/// Narrow provider-queue interface used by the pipeline.
#[async_trait]
pub trait ProviderQueue: Send + Sync {
    /// Hand a job to the provider's async queue, registering
    /// `webhook_url` for the completion callback. Returns the
    /// provider-assigned correlation id.
    async fn submit(
        &self,
        model_id: &str,
        input: &serde_json::Value,
        webhook_url: &str,
    ) -> Result<String, FalApiError>;

    /// Synchronously poll the provider's view of a request.
    async fn status(&self, model_id: &str, request_id: &str)
        -> Result<QueueStatus, FalApiError>;
}

#[async_trait]
impl ProviderQueue for FalQueueClient {
    async fn submit(
        &self,
        model_id: &str,
        input: &serde_json::Value,
        webhook_url: &str,
    ) -> Result<String, FalApiError> {
        FalQueueClient::submit(self, model_id, input, webhook_url).await
    }

    async fn status(
        &self,
        model_id: &str,
        request_id: &str,
    ) -> Result<QueueStatus, FalApiError> {
        FalQueueClient::status(self, model_id, request_id).await
    }
}
