//! Outbound notifications built from stored templates.
//!
//! [`TemplateNotifier`] renders an active template by slug and hands the
//! result to a [`NotificationTransport`]. Delivery itself (SMTP, SMS
//! gateways, push providers) lives behind the transport trait.

mod notifier;
mod transport;
mod types;

pub use notifier::{TemplateNotifier, MAIL_VERIFY_OTP_SLUG};
pub use transport::{LogTransport, NotificationTransport};
pub use types::{NotificationError, OutboundMessage};
