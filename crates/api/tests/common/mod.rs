//! Shared fixtures for API integration tests.
//!
//! Mirrors the router construction in `main.rs` so integration tests
//! exercise the same middleware stack (CORS, request ID, timeout,
//! tracing, panic recovery) that production uses, with fake pipeline
//! collaborators injected.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, Response, StatusCode};
use axum::Router;
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use sha2::Sha256;
use sqlx::PgPool;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use mirage_api::auth::jwt::{create_token, JwtConfig};
use mirage_api::config::ServerConfig;
use mirage_api::routes;
use mirage_api::state::AppState;
use mirage_cloud::{ArtifactStorage, StorageError};
use mirage_core::billing::TX_GRANT;
use mirage_core::types::DbId;
use mirage_db::models::user::CreateUser;
use mirage_db::repositories::{CreditRepo, UserRepo};
use mirage_fal::{FalApiError, QueueStatus};
use mirage_pipeline::{LifecycleEngine, ProviderQueue, Reconciler};

/// Shared-secret used to sign webhook bodies in tests.
pub const TEST_WEBHOOK_SECRET: &str = "test-webhook-secret";

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// In-memory artifact storage that always succeeds.
pub struct TestStorage;

#[async_trait]
impl ArtifactStorage for TestStorage {
    async fn download(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        Ok(format!("bytes-of:{url}").into_bytes())
    }

    async fn store(&self, _bytes: Vec<u8>, _content_type: &str) -> Result<String, StorageError> {
        Ok("artifacts/test-output.mp4".to_string())
    }
}

/// Provider queue stub: accepts every submission with a fresh correlation
/// id and reports every request as still in progress.
#[derive(Default)]
pub struct StubQueue {
    counter: AtomicU64,
}

#[async_trait]
impl ProviderQueue for StubQueue {
    async fn submit(
        &self,
        _model_id: &str,
        _input: &serde_json::Value,
        _webhook_url: &str,
    ) -> Result<String, FalApiError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("req-stub-{n}"))
    }

    async fn status(
        &self,
        _model_id: &str,
        _request_id: &str,
    ) -> Result<QueueStatus, FalApiError> {
        Ok(QueueStatus::InProgress)
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` with safe defaults and signature
/// verification enabled.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        public_base_url: "http://localhost:3000".to_string(),
        fal_base_url: "http://fal.invalid".to_string(),
        fal_api_key: String::new(),
        webhook_secret: Some(TEST_WEBHOOK_SECRET.to_string()),
        artifact_bucket: "test-bucket".to_string(),
        artifact_prefix: "test".to_string(),
        reconcile_interval_secs: 300,
        stale_after_minutes: 20,
        jwt: test_jwt_config(),
    }
}

pub fn test_jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "test-secret".to_string(),
        expiry_hours: 1,
    }
}

/// Build the full application router with all middleware layers, using
/// the given database pool and fake pipeline collaborators.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();
    let event_bus = Arc::new(mirage_events::EventBus::default());

    let engine = Arc::new(LifecycleEngine::new(
        pool.clone(),
        Arc::new(TestStorage),
        Arc::clone(&event_bus),
    ));

    let queue: Arc<dyn ProviderQueue> = Arc::new(StubQueue::default());

    let reconciler = Arc::new(Reconciler::new(
        pool.clone(),
        Arc::clone(&queue),
        Arc::clone(&engine),
    ));

    let state = AppState {
        pool,
        config: Arc::new(config),
        engine,
        queue,
        reconciler,
        event_bus,
    };

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn authed_get(app: Router, uri: &str, token: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .uri(uri)
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn authed_post_json(
    app: Router,
    uri: &str,
    token: &str,
    body: &serde_json::Value,
) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Post a webhook body with an HMAC signature (pass `None` to omit the
/// header, or `Some(sig)` to use an explicit signature).
pub async fn post_webhook(
    app: Router,
    body: &serde_json::Value,
    signature: Option<String>,
) -> Response<Body> {
    let bytes = serde_json::to_vec(body).unwrap();
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/webhooks/fal")
        .header("content-type", "application/json");
    if let Some(sig) = signature {
        builder = builder.header("x-webhook-signature", sig);
    }
    app.oneshot(builder.body(Body::from(bytes)).unwrap())
        .await
        .unwrap()
}

/// Valid signature for a JSON body under the test webhook secret.
pub fn sign(body: &serde_json::Value) -> String {
    let bytes = serde_json::to_vec(body).unwrap();
    let mut mac = Hmac::<Sha256>::new_from_slice(TEST_WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(&bytes);
    hex::encode(mac.finalize().into_bytes())
}

// ---------------------------------------------------------------------------
// Database fixtures
// ---------------------------------------------------------------------------

pub async fn seed_user(pool: &PgPool, email: &str, role: &str) -> DbId {
    UserRepo::create(
        pool,
        &CreateUser {
            email: email.to_string(),
            display_name: None,
            role: Some(role.to_string()),
        },
    )
    .await
    .unwrap()
    .id
}

pub async fn grant_credits(pool: &PgPool, user_id: DbId, amount: i64) {
    CreditRepo::credit(pool, user_id, amount, TX_GRANT, None, None, None)
        .await
        .unwrap();
}

pub fn token_for(user_id: DbId, role: &str) -> String {
    create_token(user_id, role, &test_jwt_config()).unwrap()
}

/// Create a charged, submitted job correlated to `request_id`, the state
/// a job is in while waiting for its webhook.
pub async fn inflight_job(pool: &PgPool, user_id: DbId, cost: i64, request_id: &str) -> DbId {
    use mirage_core::billing::{RelatedEntity, TX_GENERATION_CHARGE};
    use mirage_db::models::generation_job::CreateGenerationJob;
    use mirage_db::repositories::GenerationJobRepo;

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
    GenerationJobRepo::set_request_id(pool, job.id, request_id)
        .await
        .unwrap();
    GenerationJobRepo::mark_processing(pool, job.id).await.unwrap();
    job.id
}
