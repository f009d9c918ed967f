//! Outbound delivery of generated documents.
//!
//! `DeliveryChannel` is the seam between report producers (export pipeline,
//! expiration scanner) and the mail transport. Implementations:
//!
//! - [`SmtpDeliveryChannel`]: lettre SMTP transport
//! - [`DisabledDeliveryChannel`]: fails every send (no transport configured)
//! - [`RecordingDeliveryChannel`]: keeps messages in memory (tests)

use async_trait::async_trait;
use thiserror::Error;

use licensedesk_reports::Report;

pub mod disabled;
pub mod recording;
pub mod smtp;

pub use disabled::DisabledDeliveryChannel;
pub use recording::RecordingDeliveryChannel;
pub use smtp::{SmtpConfig, SmtpDeliveryChannel};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl From<Report> for Attachment {
    fn from(report: Report) -> Self {
        Self {
            filename: report.filename,
            content_type: report.content_type.to_string(),
            bytes: report.bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<Attachment>,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid address {0}")]
    InvalidAddress(String),

    #[error("could not assemble message: {0}")]
    Message(String),

    #[error("transport failure: {0}")]
    Transport(String),
}

#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn send(&self, message: OutboundMessage) -> Result<(), DeliveryError>;
}
