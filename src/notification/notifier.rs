use std::sync::Arc;

use serde_json::json;

use crate::metrics::NotificationMetrics;
use crate::template::{GetTemplateQuery, RenderTemplateQuery, TemplateService, Variables};

use super::transport::NotificationTransport;
use super::types::{NotificationError, OutboundMessage};

/// Slug of the email verification template.
pub const MAIL_VERIFY_OTP_SLUG: &str = "mail-verify-otp";

pub struct TemplateNotifier {
    service: Arc<TemplateService>,
    transport: Arc<dyn NotificationTransport>,
}

impl TemplateNotifier {
    pub fn new(service: Arc<TemplateService>, transport: Arc<dyn NotificationTransport>) -> Self {
        Self { service, transport }
    }

    /// Render the active template `slug` with `variables` and send it to
    /// `recipient`.
    #[tracing::instrument(
        name = "notifier.notify",
        skip(self, variables),
        fields(transport = self.transport.name())
    )]
    pub async fn notify(
        &self,
        recipient: &str,
        slug: &str,
        variables: Variables,
    ) -> Result<OutboundMessage, NotificationError> {
        if recipient.is_empty() {
            return Err(NotificationError::MissingRecipient);
        }

        let template = self
            .service
            .get(GetTemplateQuery {
                id: None,
                slug: Some(slug.to_string()),
            })
            .await?;

        let rendered = self
            .service
            .render(RenderTemplateQuery {
                template_id: Some(template.id),
                template_slug: None,
                variables: Some(variables),
            })
            .await?;

        let message = OutboundMessage {
            recipient: recipient.to_string(),
            channel: template.template_type,
            subject: rendered.subject,
            body: rendered.content,
            content_type: rendered.content_type,
        };

        let channel = message.channel.as_str();
        match self.transport.send(&message).await {
            Ok(()) => {
                NotificationMetrics::record_sent(channel);
                Ok(message)
            }
            Err(e) => {
                NotificationMetrics::record_failed(channel);
                tracing::warn!(error = %e, slug = %slug, "Notification delivery failed");
                Err(e)
            }
        }
    }

    /// Send the email verification code.
    pub async fn send_mail_otp(
        &self,
        recipient: &str,
        otp: &str,
    ) -> Result<OutboundMessage, NotificationError> {
        let mut variables = Variables::new();
        variables.insert("otp".to_string(), json!(otp));
        self.notify(recipient, MAIL_VERIFY_OTP_SLUG, variables).await
    }
}
