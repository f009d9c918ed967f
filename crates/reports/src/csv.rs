//! Delimited-text rendering of the expiring-license report.
//!
//! Comma separated, header first, one row per license, no quoting. Service
//! tags and license types are validated on write to contain no commas or line
//! breaks (`require_plain_label`), so every field stays on its own column.

use licensedesk_core::ExpiringLicenseReport;

use crate::{CSV_CONTENT_TYPE, DATE_FORMAT, Report};

pub const CSV_HEADER: &str = "LicenseID,DeviceServiceTag,LicenseType,ExpirationDate";
pub const CSV_FILENAME: &str = "expiring_licenses.csv";

pub fn expiring_licenses_csv(report: &ExpiringLicenseReport) -> Report {
    let mut body = String::with_capacity(64 * (report.len() + 1));
    body.push_str(CSV_HEADER);
    body.push('\n');

    for row in &report.rows {
        body.push_str(&format!(
            "{},{},{},{}\n",
            row.license_id,
            row.device_service_tag,
            row.license_type,
            row.expiration_date.format(DATE_FORMAT)
        ));
    }

    tracing::debug!(rows = report.len(), "rendered expiring license csv");

    Report {
        bytes: body.into_bytes(),
        content_type: CSV_CONTENT_TYPE,
        filename: CSV_FILENAME.to_string(),
    }
}
