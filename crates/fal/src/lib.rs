//! Client for the fal.ai asynchronous compute queue.
//!
//! Two surfaces:
//! - [`client`] — REST client for submitting jobs and polling their status.
//! - [`webhook`] — inbound completion-callback payload types and their
//!   validation into a tagged outcome.

pub mod client;
pub mod webhook;

pub use client::{FalApiError, FalQueueClient, MediaRef, QueueStatus, ResultPayload};
pub use webhook::{WebhookOutcome, WebhookParseError, WebhookPayload};
