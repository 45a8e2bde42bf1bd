use async_trait::async_trait;
use lapin::{options::BasicPublishOptions, BasicProperties, Channel};

use crate::error::AppError;
use crate::types::RefreshEvent;

/// Delivery mode 2 asks the broker to persist the message to disk.
const PERSISTENT: u8 = 2;

#[async_trait]
pub trait EventPublisher {
    async fn publish_refresh(&self, event: &RefreshEvent) -> Result<(), AppError>;
}

/// Publishes refresh events straight onto a named queue through the
/// default exchange.
pub struct RabbitPublisher {
    channel: Channel,
    queue: String,
}

impl RabbitPublisher {
    pub fn new(channel: Channel, queue: impl Into<String>) -> Self {
        Self {
            channel,
            queue: queue.into(),
        }
    }
}

#[async_trait]
impl EventPublisher for RabbitPublisher {
    async fn publish_refresh(&self, event: &RefreshEvent) -> Result<(), AppError> {
        let payload = serde_json::to_vec(event).map_err(|e| AppError::Parse(e.to_string()))?;

        self.channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_content_type("application/json".into())
                    .with_delivery_mode(PERSISTENT),
            )
            .await
            .map_err(|e| AppError::Queue(format!("Failed to publish message to {}: {e}", self.queue)))?;

        tracing::debug!("Message published to {}: location={}", self.queue, event.location);
        Ok(())
    }
}
