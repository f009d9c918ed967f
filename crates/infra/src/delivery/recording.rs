use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{DeliveryChannel, DeliveryError, OutboundMessage};

/// In-memory channel for tests.
///
/// Every accepted message is kept in order. A failing channel rejects every
/// message without recording it.
#[derive(Debug, Default)]
pub struct RecordingDeliveryChannel {
    sent: Mutex<Vec<OutboundMessage>>,
    failing: AtomicBool,
}

impl RecordingDeliveryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let channel = Self::new();
        channel.set_failing(true);
        channel
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl DeliveryChannel for RecordingDeliveryChannel {
    async fn send(&self, message: OutboundMessage) -> Result<(), DeliveryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::Transport("recording channel set to fail".to_string()));
        }
        if message.to.trim().is_empty() {
            return Err(DeliveryError::InvalidAddress(String::new()));
        }

        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            attachment = message.attachment.as_ref().map(|a| a.filename.as_str()),
            "recorded outbound message"
        );
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(to: &str) -> OutboundMessage {
        OutboundMessage {
            to: to.to_string(),
            subject: "s".into(),
            body: "b".into(),
            attachment: None,
        }
    }

    #[tokio::test]
    async fn records_in_order() {
        let channel = RecordingDeliveryChannel::new();
        channel.send(message("a@example.com")).await.unwrap();
        channel.send(message("b@example.com")).await.unwrap();

        let sent = channel.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].to, "b@example.com");
    }

    #[tokio::test]
    async fn failing_channel_records_nothing() {
        let channel = RecordingDeliveryChannel::failing();
        assert!(channel.send(message("a@example.com")).await.is_err());
        assert_eq!(channel.sent_count(), 0);

        channel.set_failing(false);
        channel.send(message("a@example.com")).await.unwrap();
        assert_eq!(channel.sent_count(), 1);
    }
}
