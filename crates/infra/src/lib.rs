//! Infrastructure layer: persistence, outbound delivery and the background
//! and on-demand report pipelines built on them.

pub mod delivery;
pub mod export;
pub mod scanner;
pub mod store;

pub use delivery::{
    Attachment, DeliveryChannel, DeliveryError, DisabledDeliveryChannel, OutboundMessage,
    RecordingDeliveryChannel, SmtpConfig, SmtpDeliveryChannel,
};
pub use export::{ExportError, ExportOutcome, ExportRequest, ExportService};
pub use scanner::{ExpirationScanner, ExpirationScannerHandle, ScanOutcome, ScannerConfig};
pub use store::{
    DeviceStats, InMemoryInventoryStore, InventoryStore, LicenseStats, Listing, Page,
    PostgresInventoryStore, StoreError, StoreResult,
};
