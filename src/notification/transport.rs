use async_trait::async_trait;

use super::types::{NotificationError, OutboundMessage};

/// Delivers rendered messages.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), NotificationError>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Transport that only logs the message. Used when no real gateway is wired.
#[derive(Debug, Default, Clone)]
pub struct LogTransport;

#[async_trait]
impl NotificationTransport for LogTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<(), NotificationError> {
        tracing::info!(
            recipient = %message.recipient,
            channel = %message.channel,
            subject = %message.subject,
            body_bytes = message.body.len(),
            "Notification sent"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
