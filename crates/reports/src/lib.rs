//! `licensedesk-reports`: the report builder.
//!
//! Pure transformation from entity state to a self-contained document:
//!
//! - `document`: format-independent layout (title, label/value fields, table)
//! - `xlsx`: single-sheet spreadsheet rendering
//! - `pdf`: fixed-size, monospaced paginated rendering
//! - `csv`: delimited text for the expiring-license report
//!
//! Every builder returns a [`Report`]: bytes + content type + filename, ready
//! for an HTTP response body or an email attachment.

pub mod csv;
pub mod document;
pub mod pdf;
pub mod xlsx;

use thiserror::Error;

use licensedesk_core::{Device, DeviceWithLicenses, License};

pub use csv::expiring_licenses_csv;
pub use document::{ReportDocument, Table};

/// MIME type of spreadsheet exports.
pub const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
/// MIME type of paginated exports.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";
/// MIME type of delimited-text reports.
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Date layout used in every document (ISO-8601 calendar date).
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Serialization failure inside a document encoder.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("spreadsheet encoding failed: {0}")]
    Spreadsheet(String),

    #[error("pdf encoding failed: {0}")]
    Pdf(String),
}

/// Export formats available for single-entity documents.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExportFormat {
    Excel,
    Pdf,
}

impl ExportFormat {
    /// `excel` (any case) selects the spreadsheet; anything else, or nothing,
    /// selects the paginated document.
    pub fn from_request(raw: Option<&str>) -> Self {
        match raw {
            Some(s) if s.trim().eq_ignore_ascii_case("excel") => ExportFormat::Excel,
            _ => ExportFormat::Pdf,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Excel => "xlsx",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Excel => XLSX_CONTENT_TYPE,
            ExportFormat::Pdf => PDF_CONTENT_TYPE,
        }
    }
}

/// A rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
}

fn render(doc: &ReportDocument, stem: &str, format: ExportFormat) -> Result<Report, ReportError> {
    let bytes = match format {
        ExportFormat::Excel => xlsx::render(doc)?,
        ExportFormat::Pdf => pdf::render(doc)?,
    };
    Ok(Report {
        bytes,
        content_type: format.content_type(),
        filename: format!("{stem}.{}", format.extension()),
    })
}

/// Build `device.xlsx` / `device.pdf` for a device and its licenses.
pub fn device_report(device: &DeviceWithLicenses, format: ExportFormat) -> Result<Report, ReportError> {
    render(&document::device_document(device), "device", format)
}

/// Build `license.xlsx` / `license.pdf` for a license and its owning device.
pub fn license_report(
    license: &License,
    device: Option<&Device>,
    format: ExportFormat,
) -> Result<Report, ReportError> {
    render(&document::license_document(license, device), "license", format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parsing_defaults_to_pdf() {
        assert_eq!(ExportFormat::from_request(Some("excel")), ExportFormat::Excel);
        assert_eq!(ExportFormat::from_request(Some("EXCEL")), ExportFormat::Excel);
        assert_eq!(ExportFormat::from_request(Some("pdf")), ExportFormat::Pdf);
        assert_eq!(ExportFormat::from_request(Some("word")), ExportFormat::Pdf);
        assert_eq!(ExportFormat::from_request(None), ExportFormat::Pdf);
    }
}
