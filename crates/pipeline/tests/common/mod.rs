//! Shared fixtures for pipeline integration tests: in-memory fakes for
//! the artifact store and the provider queue, plus database seeding
//! helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::PgPool;

use mirage_cloud::{ArtifactStorage, StorageError};
use mirage_core::billing::{RelatedEntity, TX_GENERATION_CHARGE, TX_GRANT};
use mirage_core::types::DbId;
use mirage_db::models::generation_job::{CreateGenerationJob, GenerationJob};
use mirage_db::models::user::CreateUser;
use mirage_db::repositories::{CreditRepo, GenerationJobRepo, UserRepo};
use mirage_events::EventBus;
use mirage_fal::{FalApiError, MediaRef, QueueStatus, ResultPayload};
use mirage_pipeline::{LifecycleEngine, ProviderQueue};

// ---------------------------------------------------------------------------
// Fake artifact storage
// ---------------------------------------------------------------------------

/// In-memory artifact store recording download/store calls.
#[derive(Default)]
pub struct FakeStorage {
    pub downloads: AtomicU32,
    pub stores: AtomicU32,
    /// When set, `store` fails with a simulated outage.
    pub fail_store: AtomicBool,
}

impl FakeStorage {
    pub fn download_count(&self) -> u32 {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn set_store_failing(&self, failing: bool) {
        self.fail_store.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ArtifactStorage for FakeStorage {
    async fn download(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(format!("bytes-of:{url}").into_bytes())
    }

    async fn store(&self, _bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError> {
        if self.fail_store.load(Ordering::SeqCst) {
            return Err(StorageError::Upload("simulated store outage".to_string()));
        }
        let n = self.stores.fetch_add(1, Ordering::SeqCst);
        let ext = if content_type.starts_with("video") { "mp4" } else { "bin" };
        Ok(format!("artifacts/fake-{n}.{ext}"))
    }
}

// ---------------------------------------------------------------------------
// Fake provider queue
// ---------------------------------------------------------------------------

/// Scripted response for one correlation id.
pub enum QueueScript {
    InProgress,
    Completed(ResultPayload),
    Failed(String),
    TransportError,
}

/// Programmable provider queue.
#[derive(Default)]
pub struct FakeQueue {
    /// `Some(request_id)` means submissions succeed with that id;
    /// `None` simulates a provider rejection.
    pub submit_result: Mutex<Option<String>>,
    pub statuses: Mutex<HashMap<String, QueueScript>>,
    pub submissions: AtomicU32,
}

impl FakeQueue {
    pub fn accepting(request_id: &str) -> Self {
        let queue = Self::default();
        *queue.submit_result.lock().unwrap() = Some(request_id.to_string());
        queue
    }

    pub fn rejecting() -> Self {
        Self::default()
    }

    pub fn script(&self, request_id: &str, script: QueueScript) {
        self.statuses
            .lock()
            .unwrap()
            .insert(request_id.to_string(), script);
    }
}

#[async_trait]
impl ProviderQueue for FakeQueue {
    async fn submit(
        &self,
        _model_id: &str,
        _input: &serde_json::Value,
        _webhook_url: &str,
    ) -> Result<String, FalApiError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        match self.submit_result.lock().unwrap().clone() {
            Some(id) => Ok(id),
            None => Err(FalApiError::Api {
                status: 503,
                body: "queue unavailable".to_string(),
            }),
        }
    }

    async fn status(
        &self,
        _model_id: &str,
        request_id: &str,
    ) -> Result<QueueStatus, FalApiError> {
        match self.statuses.lock().unwrap().get(request_id) {
            Some(QueueScript::InProgress) => Ok(QueueStatus::InProgress),
            Some(QueueScript::Completed(payload)) => Ok(QueueStatus::Completed(payload.clone())),
            Some(QueueScript::Failed(message)) => Ok(QueueStatus::Failed(message.clone())),
            Some(QueueScript::TransportError) | None => Err(FalApiError::Protocol(
                "connection reset by peer".to_string(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Payload and database helpers
// ---------------------------------------------------------------------------

/// A well-formed video result payload.
pub fn video_result(url: &str) -> ResultPayload {
    ResultPayload {
        video: Some(MediaRef {
            url: url.to_string(),
            content_type: Some("video/mp4".to_string()),
            file_name: None,
        }),
        image: None,
        seed: Some(serde_json::json!(1337)),
    }
}

pub fn make_engine(pool: &PgPool) -> (Arc<LifecycleEngine>, Arc<FakeStorage>, Arc<EventBus>) {
    let storage = Arc::new(FakeStorage::default());
    let events = Arc::new(EventBus::default());
    let engine = Arc::new(LifecycleEngine::new(
        pool.clone(),
        storage.clone(),
        events.clone(),
    ));
    (engine, storage, events)
}

pub async fn user_with_balance(pool: &PgPool, email: &str, balance: i64) -> DbId {
    let user = UserRepo::create(
        pool,
        &CreateUser {
            email: email.to_string(),
            display_name: None,
            role: None,
        },
    )
    .await
    .unwrap();
    if balance > 0 {
        CreditRepo::credit(pool, user.id, balance, TX_GRANT, None, None, None)
            .await
            .unwrap();
    }
    user.id
}

/// Create a job and take its charge, the way the submit unit of work does.
pub async fn charged_job(pool: &PgPool, user_id: DbId, cost: i64) -> GenerationJob {
    let job = GenerationJobRepo::create(
        pool,
        user_id,
        &CreateGenerationJob {
            model_id: "fal-ai/kling-video/v1.6/standard/image-to-video".to_string(),
            input_ref: "uploads/source.png".to_string(),
        },
    )
    .await
    .unwrap();
    CreditRepo::debit(
        pool,
        user_id,
        cost,
        TX_GENERATION_CHARGE,
        None,
        Some(RelatedEntity::generation_job(job.id)),
    )
    .await
    .unwrap();
    job
}

/// Backdate a job's creation timestamp by `minutes`.
pub async fn backdate(pool: &PgPool, job_id: DbId, minutes: i64) {
    sqlx::query(
        "UPDATE generation_jobs SET created_at = NOW() - make_interval(mins => $2) WHERE id = $1",
    )
    .bind(job_id)
    .bind(minutes as i32)
    .execute(pool)
    .await
    .unwrap();
}
