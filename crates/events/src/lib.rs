//! Observability event infrastructure.
//!
//! - [`EventBus`] — in-process fire-and-forget hub backed by
//!   `tokio::sync::broadcast`. Recording an event never blocks and never
//!   fails the caller: lifecycle transitions must not depend on the sink.
//! - [`SinkEvent`] — the canonical event envelope.
//! - [`EventPersistence`] — background service that durably writes every
//!   event to the `events` table.

pub mod bus;
pub mod persistence;

pub use bus::{EventBus, SinkEvent};
pub use persistence::EventPersistence;
