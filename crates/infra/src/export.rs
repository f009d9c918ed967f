//! On-demand export of a single device or license.
//!
//! Resolve the entity, build the document, then either hand the bytes back to
//! the caller or mail them to the requested address. A missing entity stops
//! the pipeline before anything is built or sent.

use std::sync::Arc;
use std::time::Duration;

use lettre::Address;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{info, instrument};

use licensedesk_core::{DeviceId, DomainError, DomainResult, LicenseId, normalize_email};
use licensedesk_reports::{ExportFormat, Report, ReportError, device_report, license_report};

use crate::delivery::{Attachment, DeliveryChannel, DeliveryError, OutboundMessage};
use crate::store::{InventoryStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub format: ExportFormat,
    /// Mail the document here instead of returning it.
    pub email: Option<String>,
}

impl ExportRequest {
    /// Parse the raw request fields (unknown or missing format means pdf,
    /// a blank email means no delivery). A non-blank email must be a valid
    /// mailbox address.
    pub fn from_raw(format: Option<&str>, email: Option<&str>) -> DomainResult<Self> {
        let email = email
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(recipient)
            .transpose()?;
        Ok(Self {
            format: ExportFormat::from_request(format),
            email,
        })
    }
}

fn recipient(raw: &str) -> DomainResult<String> {
    let email = normalize_email(raw)?;
    email
        .parse::<Address>()
        .map_err(|_| DomainError::validation("invalid email address"))?;
    Ok(email)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Document(Report),
    Delivered { to: String, filename: String },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),

    #[error("report build failed: {0}")]
    Build(#[from] ReportError),

    #[error("export succeeded but delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}

#[derive(Clone)]
pub struct ExportService {
    store: Arc<dyn InventoryStore>,
    channel: Arc<dyn DeliveryChannel>,
    /// Upper bound on a single delivery attempt.
    send_timeout: Duration,
}

impl ExportService {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        channel: Arc<dyn DeliveryChannel>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            store,
            channel,
            send_timeout,
        }
    }

    #[instrument(skip(self), fields(device_id = %id), err)]
    pub async fn export_device(
        &self,
        id: DeviceId,
        request: ExportRequest,
    ) -> Result<ExportOutcome, ExportError> {
        let device = self
            .store
            .get_device_with_licenses(id)
            .await?
            .ok_or(ExportError::NotFound("device"))?;

        let report = device_report(&device, request.format)?;
        let subject = format!("Device export: {}", device.device.service_tag);
        self.finish(report, request.email, subject).await
    }

    #[instrument(skip(self), fields(license_id = %id), err)]
    pub async fn export_license(
        &self,
        id: LicenseId,
        request: ExportRequest,
    ) -> Result<ExportOutcome, ExportError> {
        let license = self
            .store
            .get_license(id)
            .await?
            .ok_or(ExportError::NotFound("license"))?;

        let device = match license.device_id {
            Some(device_id) => self.store.get_device(device_id).await?,
            None => None,
        };

        let report = license_report(&license, device.as_ref(), request.format)?;
        let subject = format!("License export: {}", license.license_type);
        self.finish(report, request.email, subject).await
    }

    async fn finish(
        &self,
        report: Report,
        email: Option<String>,
        subject: String,
    ) -> Result<ExportOutcome, ExportError> {
        let Some(to) = email else {
            return Ok(ExportOutcome::Document(report));
        };

        let filename = report.filename.clone();
        let send = self.channel.send(OutboundMessage {
            to: to.clone(),
            subject,
            body: format!("The requested export is attached ({filename})."),
            attachment: Some(Attachment::from(report)),
        });
        timeout(self.send_timeout, send)
            .await
            .map_err(|_| DeliveryError::Transport("delivery timed out".to_string()))??;

        info!(to = %to, filename = %filename, "export delivered");
        Ok(ExportOutcome::Delivered { to, filename })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;

    use licensedesk_core::{NewDevice, NewLicense};
    use licensedesk_reports::{PDF_CONTENT_TYPE, XLSX_CONTENT_TYPE};

    use super::*;
    use crate::delivery::RecordingDeliveryChannel;
    use crate::store::InMemoryInventoryStore;

    const SEND_TIMEOUT: Duration = Duration::from_secs(5);

    fn request(format: Option<&str>, email: Option<&str>) -> ExportRequest {
        ExportRequest::from_raw(format, email).unwrap()
    }

    struct Fixture {
        store: Arc<InMemoryInventoryStore>,
        channel: Arc<RecordingDeliveryChannel>,
        service: ExportService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryInventoryStore::new());
        let channel = Arc::new(RecordingDeliveryChannel::new());
        let service = ExportService::new(store.clone(), channel.clone(), SEND_TIMEOUT);
        Fixture {
            store,
            channel,
            service,
        }
    }

    async fn seed(store: &InMemoryInventoryStore) -> (DeviceId, LicenseId) {
        let device = store
            .create_device(
                NewDevice {
                    service_tag: "SVC001".into(),
                    device_type: "laptop".into(),
                },
                Utc::now(),
            )
            .await
            .unwrap();
        let license = store
            .create_license(
                NewLicense {
                    license_type: "Office365".into(),
                    expiration_date: "2099-01-01".parse().unwrap(),
                    device_id: Some(device.id),
                },
                Utc::now(),
            )
            .await
            .unwrap();
        (device.id, license.id)
    }

    fn contains(haystack: &[u8], needle: &str) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle.as_bytes())
    }

    #[test]
    fn raw_request_parsing() {
        let req = request(Some("Excel"), Some("  "));
        assert_eq!(req.format, ExportFormat::Excel);
        assert_eq!(req.email, None);

        let req = request(None, Some(" Ops@Example.com "));
        assert_eq!(req.format, ExportFormat::Pdf);
        assert_eq!(req.email.as_deref(), Some("ops@example.com"));
    }

    #[test]
    fn malformed_recipient_is_rejected() {
        for raw in ["not-an-address", "ops@", "ops example@example.com", "a@b@c"] {
            let err = ExportRequest::from_raw(Some("pdf"), Some(raw)).unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)), "{raw} accepted");
        }
    }

    #[tokio::test]
    async fn device_pdf_is_returned_inline() {
        let f = fixture();
        let (device_id, _) = seed(&f.store).await;

        let outcome = f
            .service
            .export_device(device_id, request(None, None))
            .await
            .unwrap();

        let ExportOutcome::Document(report) = outcome else {
            panic!("expected an inline document");
        };
        assert_eq!(report.content_type, PDF_CONTENT_TYPE);
        assert_eq!(report.filename, "device.pdf");
        assert!(contains(&report.bytes, "SVC001"));
        assert!(contains(&report.bytes, "Office365"));
        assert_eq!(f.channel.sent_count(), 0);
    }

    #[tokio::test]
    async fn missing_device_short_circuits() {
        let f = fixture();
        let err = f
            .service
            .export_device(DeviceId::new(), request(Some("excel"), Some("ops@example.com")))
            .await
            .unwrap_err();

        assert!(matches!(err, ExportError::NotFound("device")));
        assert_eq!(f.channel.sent_count(), 0);
    }

    #[tokio::test]
    async fn excel_exports_are_mailed_when_an_address_is_given() {
        let f = fixture();
        let (device_id, license_id) = seed(&f.store).await;
        let request = request(Some("excel"), Some("ops@example.com"));

        let device = f.service.export_device(device_id, request.clone()).await.unwrap();
        assert_eq!(
            device,
            ExportOutcome::Delivered {
                to: "ops@example.com".into(),
                filename: "device.xlsx".into(),
            }
        );

        let license = f.service.export_license(license_id, request).await.unwrap();
        assert!(matches!(license, ExportOutcome::Delivered { ref filename, .. } if filename == "license.xlsx"));

        let sent = f.channel.sent();
        assert_eq!(sent.len(), 2);
        for (message, filename) in sent.iter().zip(["device.xlsx", "license.xlsx"]) {
            let attachment = message.attachment.as_ref().unwrap();
            assert_eq!(message.to, "ops@example.com");
            assert_eq!(attachment.filename, filename);
            assert_eq!(attachment.content_type, XLSX_CONTENT_TYPE);
        }
    }

    #[tokio::test]
    async fn delivery_failure_is_reported_separately() {
        let f = fixture();
        let (_, license_id) = seed(&f.store).await;
        f.channel.set_failing(true);

        let err = f
            .service
            .export_license(license_id, request(Some("pdf"), Some("ops@example.com")))
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Delivery(_)));
    }

    #[tokio::test]
    async fn store_outage_is_a_persistence_error() {
        let f = fixture();
        let (device_id, _) = seed(&f.store).await;
        f.store.set_unavailable(true);

        let err = f
            .service
            .export_device(device_id, request(None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Persistence(StoreError::Backend(_))));
    }

    struct StalledChannel;

    #[async_trait]
    impl DeliveryChannel for StalledChannel {
        async fn send(&self, _message: OutboundMessage) -> Result<(), DeliveryError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_delivery_times_out() {
        let store = Arc::new(InMemoryInventoryStore::new());
        let (device_id, _) = seed(&store).await;
        let service = ExportService::new(store, Arc::new(StalledChannel), SEND_TIMEOUT);

        let err = service
            .export_device(device_id, request(Some("excel"), Some("ops@example.com")))
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Delivery(DeliveryError::Transport(ref msg)) if msg == "delivery timed out"));
    }
}
