//! License entity: a software license attached to a device.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::expiration;
use crate::error::{DomainError, DomainResult, require_plain_label};
use crate::id::{DeviceId, LicenseId};

/// A software license.
///
/// `device_id` is an explicit optional foreign key: `None` means the license
/// is not attached to any device. New licenses always carry a device; the
/// store checks that it exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub id: LicenseId,
    pub license_type: String,
    pub expiration_date: NaiveDate,
    pub device_id: Option<DeviceId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl License {
    /// Whether the license has passed its expiration date at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        expiration::is_expired(self.expiration_date, now)
    }

    pub fn apply_update(&mut self, update: LicenseUpdate, now: DateTime<Utc>) -> DomainResult<()> {
        if let Some(kind) = update.license_type {
            self.license_type = require_plain_label("license_type", &kind)?;
        }
        if let Some(date) = update.expiration_date {
            self.expiration_date = date;
        }
        if let Some(device_id) = update.device_id {
            self.device_id = Some(device_id);
        }
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for License {
    type Id = LicenseId;

    fn id(&self) -> LicenseId {
        self.id
    }
}

/// Input for creating a license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLicense {
    pub license_type: String,
    pub expiration_date: NaiveDate,
    pub device_id: Option<DeviceId>,
}

impl NewLicense {
    pub fn into_license(self, now: DateTime<Utc>) -> DomainResult<License> {
        let device_id = self
            .device_id
            .ok_or_else(|| DomainError::validation("device_id is required"))?;

        Ok(License {
            id: LicenseId::new(),
            license_type: require_plain_label("license_type", &self.license_type)?,
            expiration_date: self.expiration_date,
            device_id: Some(device_id),
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial license update.
///
/// A license can be moved to another device but never detached through an
/// update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseUpdate {
    #[serde(default)]
    pub license_type: Option<String>,
    #[serde(default)]
    pub expiration_date: Option<NaiveDate>,
    #[serde(default)]
    pub device_id: Option<DeviceId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn new_license_requires_device() {
        let err = NewLicense {
            license_type: "Office365".into(),
            expiration_date: date("2099-01-01"),
            device_id: None,
        }
        .into_license(Utc::now())
        .unwrap_err();
        assert_eq!(err, DomainError::validation("device_id is required"));
    }

    #[test]
    fn expired_from_the_start_of_the_date() {
        let license = NewLicense {
            license_type: "Office365".into(),
            expiration_date: date("2024-01-01"),
            device_id: Some(DeviceId::new()),
        }
        .into_license(Utc::now())
        .unwrap();

        let day_before = date("2023-12-31").and_hms_opt(23, 59, 59).unwrap().and_utc();
        let on_the_day = date("2024-01-01").and_hms_opt(12, 0, 0).unwrap().and_utc();
        assert!(!license.is_expired(day_before));
        assert!(license.is_expired(on_the_day));
    }

    #[test]
    fn update_moves_license_between_devices() {
        let first = DeviceId::new();
        let second = DeviceId::new();
        let mut license = NewLicense {
            license_type: "Visio".into(),
            expiration_date: date("2030-06-30"),
            device_id: Some(first),
        }
        .into_license(Utc::now())
        .unwrap();

        license
            .apply_update(
                LicenseUpdate {
                    device_id: Some(second),
                    expiration_date: Some(date("2031-06-30")),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();

        assert_eq!(license.device_id, Some(second));
        assert_eq!(license.expiration_date, date("2031-06-30"));
        assert_eq!(license.license_type, "Visio");
    }
}
