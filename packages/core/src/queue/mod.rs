//! RabbitMQ plumbing shared by the API (publisher side) and the email
//! worker (consumer side).

pub mod consumer;
pub mod publisher;

use lapin::{
    options::QueueDeclareOptions, types::FieldTable, Channel, Connection, ConnectionProperties,
};

use crate::error::AppError;

/// Durable queue carrying [`RefreshEvent`](crate::types::RefreshEvent)s.
pub const REFRESH_QUEUE: &str = "weather_refresh_events";

/// A live broker connection plus the one channel this process uses.
///
/// Build once in `main` and hand clones of [`Broker::channel`] to whatever
/// needs to publish or consume.
pub struct Broker {
    connection: Connection,
    channel: Channel,
}

impl Broker {
    /// Connect and assert the durable refresh queue.
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| AppError::Queue(format!("Failed to connect to RabbitMQ: {e}")))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| AppError::Queue(format!("Failed to create channel: {e}")))?;

        declare_refresh_queue(&channel).await?;

        tracing::info!("Connected to RabbitMQ and asserted queue: {}", REFRESH_QUEUE);

        Ok(Self {
            connection,
            channel,
        })
    }

    pub fn channel(&self) -> Channel {
        self.channel.clone()
    }

    pub async fn close(self) {
        if let Err(err) = self.channel.close(200, "shutdown").await {
            tracing::warn!("Failed to close RabbitMQ channel: {}", err);
        } else {
            tracing::info!("RabbitMQ channel closed");
        }

        if let Err(err) = self.connection.close(200, "shutdown").await {
            tracing::warn!("Failed to close RabbitMQ connection: {}", err);
        } else {
            tracing::info!("RabbitMQ connection closed");
        }
    }
}

async fn declare_refresh_queue(channel: &Channel) -> Result<(), AppError> {
    channel
        .queue_declare(
            REFRESH_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| AppError::Queue(format!("Failed to declare queue {REFRESH_QUEUE}: {e}")))?;

    Ok(())
}
