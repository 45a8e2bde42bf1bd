//! Refresh event consumer loop.
//!
//! Each delivery moves through received → processing → acked or
//! nacked-with-requeue. Nothing here has a retry cap: a message whose
//! notification keeps failing is redelivered until it succeeds.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use lapin::{
    message::Delivery,
    options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions},
    types::FieldTable,
    Channel,
};
use serde::Deserialize;
use tokio::signal;

use crate::error::AppError;
use crate::notification::NotificationSender;

const CONSUMER_TAG: &str = "email-worker";

/// What the consumer decided to do with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    Requeue,
}

/// A received message that can be settled exactly once.
#[async_trait]
pub trait InboundMessage {
    fn body(&self) -> &[u8];
    async fn ack(&self) -> Result<(), AppError>;
    async fn nack_requeue(&self) -> Result<(), AppError>;
}

#[async_trait]
impl InboundMessage for Delivery {
    fn body(&self) -> &[u8] {
        &self.data
    }

    async fn ack(&self) -> Result<(), AppError> {
        self.acker
            .ack(BasicAckOptions::default())
            .await
            .map_err(|e| AppError::Queue(format!("Failed to ack message: {e}")))
    }

    async fn nack_requeue(&self) -> Result<(), AppError> {
        self.acker
            .nack(BasicNackOptions {
                requeue: true,
                ..BasicNackOptions::default()
            })
            .await
            .map_err(|e| AppError::Queue(format!("Failed to nack message: {e}")))
    }
}

/// Only `location` is required; the publisher's `timestamp` is ignored.
#[derive(Debug, Deserialize)]
struct RefreshEnvelope {
    location: String,
}

pub struct RefreshConsumer {
    notifier: Arc<dyn NotificationSender + Send + Sync>,
}

impl RefreshConsumer {
    pub fn new(notifier: Arc<dyn NotificationSender + Send + Sync>) -> Self {
        Self { notifier }
    }

    /// Decide the fate of one message body. Never fails: every problem
    /// turns into [`Disposition::Requeue`].
    pub async fn process(&self, body: &[u8]) -> Disposition {
        let envelope: RefreshEnvelope = match serde_json::from_slice(body) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::error!("Error processing message: {}", err);
                return Disposition::Requeue;
            }
        };

        tracing::debug!("Received refresh event for location: {}", envelope.location);

        match self.notifier.send_refresh_notification(&envelope.location).await {
            Ok(()) => Disposition::Ack,
            Err(err) => {
                tracing::error!(
                    "Error processing message for location {}: {}",
                    envelope.location,
                    err
                );
                Disposition::Requeue
            }
        }
    }

    /// Process a message and settle it with the broker.
    pub async fn handle<M>(&self, message: &M) -> Result<Disposition, AppError>
    where
        M: InboundMessage + Sync,
    {
        let disposition = self.process(message.body()).await;

        match disposition {
            Disposition::Ack => {
                message.ack().await?;
                tracing::debug!("Message acknowledged");
            }
            Disposition::Requeue => {
                message.nack_requeue().await?;
                tracing::debug!("Message requeued");
            }
        }

        Ok(disposition)
    }
}

/// Consume the queue one message at a time until Ctrl+C or the broker
/// closes the stream.
pub async fn run_consumer(
    channel: Channel,
    queue: &str,
    consumer: RefreshConsumer,
) -> Result<(), AppError> {
    channel
        .basic_qos(1, BasicQosOptions::default())
        .await
        .map_err(|e| AppError::Queue(format!("Failed to set prefetch: {e}")))?;

    let deliveries = channel
        .basic_consume(
            queue,
            CONSUMER_TAG,
            BasicConsumeOptions {
                no_ack: false,
                ..BasicConsumeOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| AppError::Queue(format!("Failed to start consuming {queue}: {e}")))?;

    tracing::info!("Email worker listening on queue: {}", queue);

    consume(deliveries, &consumer, shutdown_signal()).await?;

    tracing::info!("Email worker stopped cleanly");
    Ok(())
}

/// Settle deliveries one at a time until `shutdown` resolves or the stream
/// ends. A shutdown that fires mid-message takes effect once that message
/// is settled.
pub async fn consume<S, M, E>(
    mut deliveries: S,
    consumer: &RefreshConsumer,
    shutdown: impl Future<Output = ()>,
) -> Result<(), AppError>
where
    S: Stream<Item = Result<M, E>> + Unpin,
    M: InboundMessage + Sync,
    E: Display,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received. Stopping consumer.");
                return Ok(());
            }

            next = deliveries.next() => match next {
                Some(Ok(delivery)) => {
                    consumer.handle(&delivery).await?;
                }
                Some(Err(err)) => {
                    return Err(AppError::Queue(format!("Consumer stream failed: {err}")));
                }
                None => {
                    tracing::warn!("Consumer stream closed by broker");
                    return Ok(());
                }
            },
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordedSettlement, RecordingMessage, ScriptedNotifier};
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    fn consumer_with(notifier: &Arc<ScriptedNotifier>) -> RefreshConsumer {
        RefreshConsumer::new(notifier.clone())
    }

    #[tokio::test]
    async fn valid_message_is_delivered_and_acked() {
        let notifier = Arc::new(ScriptedNotifier::succeeding());
        let message = RecordingMessage::new(br#"{"location":"Jakarta"}"#);

        let disposition = consumer_with(&notifier).handle(&message).await.unwrap();

        assert_eq!(disposition, Disposition::Ack);
        assert_eq!(notifier.locations(), vec!["Jakarta".to_string()]);
        assert_eq!(message.settlements(), vec![RecordedSettlement::Ack]);
    }

    #[tokio::test]
    async fn publisher_envelope_with_timestamp_is_accepted() {
        let notifier = Arc::new(ScriptedNotifier::succeeding());
        let message = RecordingMessage::new(
            br#"{"location":"Denpasar","timestamp":"2026-01-01T00:00:00Z"}"#,
        );

        let disposition = consumer_with(&notifier).handle(&message).await.unwrap();

        assert_eq!(disposition, Disposition::Ack);
        assert_eq!(notifier.locations(), vec!["Denpasar".to_string()]);
    }

    #[tokio::test]
    async fn invalid_json_is_requeued_without_notifying() {
        let notifier = Arc::new(ScriptedNotifier::succeeding());
        let message = RecordingMessage::new(b"not a valid json");

        let disposition = consumer_with(&notifier).handle(&message).await.unwrap();

        assert_eq!(disposition, Disposition::Requeue);
        assert!(notifier.locations().is_empty());
        assert_eq!(message.settlements(), vec![RecordedSettlement::NackRequeue]);
    }

    #[tokio::test]
    async fn missing_location_is_requeued_without_notifying() {
        let notifier = Arc::new(ScriptedNotifier::succeeding());
        let message = RecordingMessage::new(br#"{"timestamp":"2026-01-01T00:00:00Z"}"#);

        let disposition = consumer_with(&notifier).handle(&message).await.unwrap();

        assert_eq!(disposition, Disposition::Requeue);
        assert!(notifier.locations().is_empty());
    }

    #[tokio::test]
    async fn failed_notification_is_requeued() {
        let notifier = Arc::new(ScriptedNotifier::failing());
        let message = RecordingMessage::new(br#"{"location":"Denpasar"}"#);

        let disposition = consumer_with(&notifier).handle(&message).await.unwrap();

        assert_eq!(disposition, Disposition::Requeue);
        assert_eq!(notifier.locations(), vec!["Denpasar".to_string()]);
        assert_eq!(message.settlements(), vec![RecordedSettlement::NackRequeue]);
    }

    #[tokio::test]
    async fn permanently_failing_message_is_requeued_every_time() {
        let notifier = Arc::new(ScriptedNotifier::failing());
        let consumer = consumer_with(&notifier);

        for _ in 0..5 {
            let redelivery = RecordingMessage::new(br#"{"location":"Denpasar"}"#);
            assert_eq!(consumer.handle(&redelivery).await.unwrap(), Disposition::Requeue);
        }

        assert_eq!(notifier.locations().len(), 5);
    }

    #[tokio::test]
    async fn settle_failure_is_propagated() {
        let notifier = Arc::new(ScriptedNotifier::succeeding());
        let message = RecordingMessage::new(br#"{"location":"Jakarta"}"#).failing_settlement();

        let result = consumer_with(&notifier).handle(&message).await;

        assert!(matches!(result, Err(AppError::Queue(_))));
    }

    /// Fires the shutdown trigger from inside the first notification.
    struct ShutdownDuringSend {
        trigger: Mutex<Option<oneshot::Sender<()>>>,
    }

    #[async_trait]
    impl NotificationSender for ShutdownDuringSend {
        async fn send_refresh_notification(&self, _location: &str) -> Result<(), AppError> {
            if let Some(trigger) = self.trigger.lock().unwrap().take() {
                let _ = trigger.send(());
            }
            Ok(())
        }
    }

    fn refresh_message(location: &str) -> Arc<RecordingMessage> {
        Arc::new(RecordingMessage::new(
            format!(r#"{{"location":"{location}"}}"#).as_bytes(),
        ))
    }

    #[tokio::test]
    async fn shutdown_during_processing_stops_after_settling_current_message() {
        let (tx, rx) = oneshot::channel();
        let consumer = RefreshConsumer::new(Arc::new(ShutdownDuringSend {
            trigger: Mutex::new(Some(tx)),
        }));
        let first = refresh_message("Jakarta");
        let second = refresh_message("Bandung");
        let deliveries = futures::stream::iter(vec![
            Ok::<_, &str>(first.clone()),
            Ok(second.clone()),
        ]);

        consume(deliveries, &consumer, async move {
            rx.await.ok();
        })
        .await
        .unwrap();

        assert_eq!(first.settlements(), vec![RecordedSettlement::Ack]);
        assert!(second.settlements().is_empty());
    }

    #[tokio::test]
    async fn consume_settles_everything_until_stream_ends() {
        let notifier = Arc::new(ScriptedNotifier::succeeding());
        let first = refresh_message("Jakarta");
        let second = Arc::new(RecordingMessage::new(b"garbage"));
        let deliveries = futures::stream::iter(vec![
            Ok::<_, &str>(first.clone()),
            Ok(second.clone()),
        ]);

        consume(deliveries, &consumer_with(&notifier), std::future::pending())
            .await
            .unwrap();

        assert_eq!(first.settlements(), vec![RecordedSettlement::Ack]);
        assert_eq!(second.settlements(), vec![RecordedSettlement::NackRequeue]);
        assert_eq!(notifier.locations(), vec!["Jakarta".to_string()]);
    }

    #[tokio::test]
    async fn consume_reports_stream_failure() {
        let notifier = Arc::new(ScriptedNotifier::succeeding());
        let deliveries =
            futures::stream::iter(vec![Err::<Arc<RecordingMessage>, _>("connection reset")]);

        let result = consume(deliveries, &consumer_with(&notifier), std::future::pending()).await;

        assert!(matches!(result, Err(AppError::Queue(_))));
    }
}
