//! Format-independent document layout.
//!
//! A document is a title, a list of label/value fields and an optional
//! repeating table (one row per list item). Encoders decide how to place
//! these on a sheet or a page.

use licensedesk_core::{Device, DeviceWithLicenses, License};

use crate::DATE_FORMAT;

/// Repeating block of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDocument {
    pub title: String,
    pub fields: Vec<(String, String)>,
    pub table: Table,
}

fn field(label: &str, value: impl Into<String>) -> (String, String) {
    (label.to_string(), value.into())
}

/// Layout for a device: identity fields, then one row per license.
pub fn device_document(device: &DeviceWithLicenses) -> ReportDocument {
    let d = &device.device;
    ReportDocument {
        title: "Device Report".to_string(),
        fields: vec![
            field("Service Tag", d.service_tag.as_str()),
            field("Device Type", d.device_type.as_str()),
            field("Created", d.created_at.format(DATE_FORMAT).to_string()),
            field("Licenses", device.licenses.len().to_string()),
        ],
        table: Table {
            columns: vec!["License Type".to_string(), "Expiration Date".to_string()],
            rows: device
                .licenses
                .iter()
                .map(|l| {
                    vec![
                        l.license_type.clone(),
                        l.expiration_date.format(DATE_FORMAT).to_string(),
                    ]
                })
                .collect(),
        },
    }
}

/// Layout for a license: its own fields plus the owning device's identity.
pub fn license_document(license: &License, device: Option<&Device>) -> ReportDocument {
    ReportDocument {
        title: "License Report".to_string(),
        fields: vec![
            field("License ID", license.id.to_string()),
            field("License Type", license.license_type.as_str()),
            field(
                "Expiration Date",
                license.expiration_date.format(DATE_FORMAT).to_string(),
            ),
            field(
                "Service Tag",
                device.map(|d| d.service_tag.as_str()).unwrap_or_default(),
            ),
            field(
                "Device Type",
                device.map(|d| d.device_type.as_str()).unwrap_or_default(),
            ),
        ],
        table: Table::default(),
    }
}
