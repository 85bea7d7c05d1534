use serde::Serialize;
use thiserror::Error;

use crate::template::{TemplateError, TemplateType};

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    /// Address on the channel (email address, phone number, device token)
    pub recipient: String,
    /// Channel, taken from the template type
    pub channel: TemplateType,
    pub subject: String,
    pub body: String,
    pub content_type: String,
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Recipient is required")]
    MissingRecipient,

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Transport {transport} failed: {message}")]
    Transport {
        transport: &'static str,
        message: String,
    },
}
