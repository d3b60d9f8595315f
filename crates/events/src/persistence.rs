//! Durable event persistence service.
//!
//! [`EventPersistence`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! broadcast channel and writes every received [`SinkEvent`] to the
//! `events` table. It runs as a long-lived background task and shuts down
//! gracefully when the bus sender is dropped. Persistence failures are
//! logged and dropped; they never propagate to the code that recorded
//! the event.

use tokio::sync::broadcast;

use mirage_db::repositories::EventRepo;
use mirage_db::DbPool;

use crate::bus::SinkEvent;

/// Background service that persists observability events to the database.
pub struct EventPersistence;

impl EventPersistence {
    /// Run the persistence loop.
    ///
    /// Subscribes to the event bus via the provided `receiver` and persists
    /// every event it receives. The loop exits when the channel is closed
    /// (i.e. the [`EventBus`](crate::bus::EventBus) is dropped).
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<SinkEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let result = EventRepo::insert(
                        &pool,
                        &event.event_type,
                        event.user_id,
                        &event.payload,
                        event.source_ip.as_deref(),
                    )
                    .await;

                    if let Err(e) = result {
                        tracing::error!(
                            error = %e,
                            event_type = %event.event_type,
                            "Failed to persist event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "Event persistence lagged, some events were not persisted"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, persistence shutting down");
                    break;
                }
            }
        }
    }
}
