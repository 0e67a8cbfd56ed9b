//! Mail delivery of finished report batches.

pub mod dispatcher;
pub mod transport;

pub use dispatcher::{MailDispatcher, attachment_name};
pub use transport::{
    Connector, MailTransport, SmtpConnector, TransportError, classify_auth_failure,
    classify_send_failure, classify_upgrade_failure,
};

use crate::error::DeliveryError;

/// What happened to one delivery attempt. Delivery never raises; failures are
/// carried here after being logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attachments: usize, recipients: usize },
    Failed(DeliveryError),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}
