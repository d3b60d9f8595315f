//! Generation pipeline: the job lifecycle engine, the submit unit of
//! work, and the reconciliation poller.
//!
//! Everything here is driven by dependency-injected component instances
//! (pool, provider queue, artifact storage, event bus) constructed once
//! per process; no ambient singletons.

use mirage_core::types::DbId;
use mirage_db::repositories::LedgerError;

pub mod lifecycle;
pub mod provider;
pub mod reconcile;
pub mod submit;

pub use lifecycle::{LifecycleEngine, Resolution};
pub use provider::ProviderQueue;
pub use reconcile::{ReconcileReport, Reconciler};
pub use submit::submit_generation;

/// Errors from pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Ledger rejection, most importantly insufficient funds at submit time.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The provider rejected or was unreachable at submit time. The job
    /// record stays `pending` and the charge has been refunded.
    #[error("Provider submission failed: {0}")]
    Submission(#[source] mirage_fal::FalApiError),

    /// Artifact download/upload failed while resolving a success. The job
    /// is left unresolved so a later cycle can retry; it is never marked
    /// `completed` without a persisted artifact.
    #[error("Artifact persistence failed: {0}")]
    ArtifactPersist(#[from] mirage_cloud::StorageError),

    /// A success payload carried no artifact reference to persist.
    #[error("Provider result carried no artifact reference")]
    MissingArtifact,

    #[error("Generation job not found: {0}")]
    JobNotFound(DbId),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
