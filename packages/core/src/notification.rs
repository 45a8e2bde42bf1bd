//! Refresh notification delivery.
//!
//! The worker calls [`NotificationSender::send_refresh_notification`] once
//! per refresh event. [`EmailNotifier`] simulates an email provider: it waits
//! out a fixed latency and logs what it would have sent.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::AppError;

/// Default simulated provider latency.
pub const DEFAULT_SEND_DELAY: Duration = Duration::from_millis(1000);

#[async_trait]
pub trait NotificationSender {
    async fn send_refresh_notification(&self, location: &str) -> Result<(), AppError>;
}

pub struct EmailNotifier {
    delay: Duration,
}

impl EmailNotifier {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl NotificationSender for EmailNotifier {
    async fn send_refresh_notification(&self, location: &str) -> Result<(), AppError> {
        tokio::time::sleep(self.delay).await;

        tracing::debug!("Simulating email notification for weather refresh in {}.", location);
        tracing::debug!("Email content: \"Weather data for {} has been refreshed.\"", location);
        Ok(())
    }
}
