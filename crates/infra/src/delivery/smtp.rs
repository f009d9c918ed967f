//! SMTP delivery through lettre's blocking transport.
//!
//! The transport runs on tokio's blocking pool so a slow relay never stalls
//! the async workers.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MailAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use super::{DeliveryChannel, DeliveryError, OutboundMessage};

pub const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    /// Upgrade the connection with STARTTLS.
    pub starttls: bool,
}

#[derive(Clone)]
pub struct SmtpDeliveryChannel {
    transport: SmtpTransport,
    from: Mailbox,
}

impl std::fmt::Debug for SmtpDeliveryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpDeliveryChannel")
            .field("from", &self.from.to_string())
            .finish_non_exhaustive()
    }
}

fn parse_mailbox(raw: &str) -> Result<Mailbox, DeliveryError> {
    raw.trim()
        .parse::<Mailbox>()
        .map_err(|e| DeliveryError::InvalidAddress(format!("{raw:?}: {e}")))
}

impl SmtpDeliveryChannel {
    pub fn new(config: SmtpConfig) -> Result<Self, DeliveryError> {
        let from = parse_mailbox(&config.from)?;

        let builder = if config.starttls {
            SmtpTransport::starttls_relay(&config.host)
                .map_err(|e| DeliveryError::Transport(format!("{}: {e}", config.host)))?
        } else {
            SmtpTransport::builder_dangerous(&config.host)
        };
        let builder = builder.port(config.port);
        let builder = match (config.username, config.password) {
            (Some(user), Some(pass)) => builder.credentials(Credentials::new(user, pass)),
            _ => builder,
        };

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

/// Assemble the MIME message: plain-text body plus the optional attachment.
pub fn build_message(from: &Mailbox, message: OutboundMessage) -> Result<Message, DeliveryError> {
    let to = parse_mailbox(&message.to)?;
    let builder = Message::builder()
        .from(from.clone())
        .to(to)
        .subject(message.subject);

    let built = match message.attachment {
        Some(attachment) => {
            let content_type = ContentType::parse(&attachment.content_type)
                .map_err(|e| DeliveryError::Message(format!("{}: {e}", attachment.content_type)))?;
            builder.multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(message.body))
                    .singlepart(MailAttachment::new(attachment.filename).body(attachment.bytes, content_type)),
            )
        }
        None => builder.header(ContentType::TEXT_PLAIN).body(message.body),
    };

    built.map_err(|e| DeliveryError::Message(e.to_string()))
}

#[async_trait]
impl DeliveryChannel for SmtpDeliveryChannel {
    async fn send(&self, message: OutboundMessage) -> Result<(), DeliveryError> {
        let to = message.to.clone();
        let email = build_message(&self.from, message)?;
        let transport = self.transport.clone();

        tokio::task::spawn_blocking(move || transport.send(&email))
            .await
            .map_err(|e| DeliveryError::Transport(format!("smtp task failed: {e}")))?
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        tracing::info!(to = %to, "smtp message sent");
        Ok(())
    }
}
