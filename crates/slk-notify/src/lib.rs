//! Guest-notification contract.
//!
//! Delivery is an external collaborator: this crate only defines the send
//! contract (recipient, subject, body), composes the confirmation message,
//! and ships a log-only implementation. A notification failure never fails
//! the event that triggered it; the engine logs and moves on.

use std::fmt;

use slk_schemas::StayWindow;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyError(pub String);

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "notification send failed: {}", self.0)
    }
}

impl std::error::Error for NotifyError {}

/// Outbound notification contract.
pub trait Notifier: Send + Sync {
    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// A composed message, ready for any [`Notifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub subject: String,
    pub body: String,
}

/// Build the guest confirmation for a freshly provisioned code.
pub fn compose_confirmation(
    guest_name: &str,
    property_name: &str,
    code: &str,
    window: &StayWindow,
) -> Confirmation {
    let checkin = window.starts_at.format("%Y-%m-%d %I:%M %p %:z");
    let checkout = window.ends_at.format("%Y-%m-%d %I:%M %p %:z");
    Confirmation {
        subject: format!("Your Access Code for {property_name}"),
        body: format!(
            "Hello {guest_name},\n\n\
             Your access code for {property_name} is ready.\n\n\
             Access Code: {code}\n\
             Check-in: {checkin}\n\
             Check-out: {checkout}\n\n\
             Please save this information for your stay.\n\n\
             Best regards,\n\
             Guest Services\n"
        ),
    }
}

/// Writes every send to the log instead of an outbound channel. The
/// default wiring until a real delivery integration is configured.
#[derive(Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, recipient: &str, subject: &str, _body: &str) -> Result<(), NotifyError> {
        info!(recipient, subject, "notification sent");
        Ok(())
    }
}
