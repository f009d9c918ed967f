use async_trait::async_trait;

use super::{DeliveryChannel, DeliveryError, OutboundMessage};

/// Channel used when no mail transport is configured.
///
/// Every send fails, so callers report the delivery as failed instead of
/// claiming the mail went out.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledDeliveryChannel;

impl DisabledDeliveryChannel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DeliveryChannel for DisabledDeliveryChannel {
    async fn send(&self, message: OutboundMessage) -> Result<(), DeliveryError> {
        tracing::warn!(
            to = %message.to,
            subject = %message.subject,
            "dropping outbound message: delivery not configured"
        );
        Err(DeliveryError::Transport("delivery not configured".to_string()))
    }
}
