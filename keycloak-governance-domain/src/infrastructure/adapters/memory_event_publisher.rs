use crate::application::ports::{DomainEvent, EventError, EventPublisher};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::info;

/// In-memory event publisher; the receiver side is handed to whoever forwards
/// governance events to the audit backend.
pub struct MemoryEventPublisher {
    sender: mpsc::UnboundedSender<DomainEvent>,
}

impl MemoryEventPublisher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventPublisher for MemoryEventPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<(), EventError> {
        info!(
            realm = %event.realm,
            "Publishing {} for {}",
            event.event_type, event.aggregate_id
        );

        self.sender
            .send(event)
            .map_err(|e| EventError::PublishFailed {
                message: format!("Audit channel closed: {e}"),
            })
    }

    async fn publish_batch(&self, events: Vec<DomainEvent>) -> Result<(), EventError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), EventError> {
        Ok(())
    }
}
