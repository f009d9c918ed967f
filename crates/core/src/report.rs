//! Derived expiring-license report (computed, serialized, discarded).

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::id::LicenseId;

/// One row of the expiring-license report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpiringLicenseRow {
    pub license_id: LicenseId,
    /// Empty when the owning device could not be resolved.
    pub device_service_tag: String,
    pub license_type: String,
    pub expiration_date: NaiveDate,
}

/// Ordered rows produced by one scan; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpiringLicenseReport {
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<ExpiringLicenseRow>,
}

impl ExpiringLicenseReport {
    pub fn new(generated_at: DateTime<Utc>, rows: Vec<ExpiringLicenseRow>) -> Self {
        Self { generated_at, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
