//! Device entity: a piece of hardware identified by its service tag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::{DomainResult, require_label, require_plain_label};
use crate::id::DeviceId;
use crate::license::License;

/// A managed device.
///
/// # Invariants
/// - `service_tag` is unique across non-deleted devices (enforced by the store).
/// - A device with `deleted_at` set is invisible to lookups; its licenses are gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub service_tag: String,
    pub device_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Device {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Apply a partial update, validating every field that is present.
    pub fn apply_update(&mut self, update: DeviceUpdate, now: DateTime<Utc>) -> DomainResult<()> {
        if let Some(tag) = update.service_tag {
            self.service_tag = require_plain_label("service_tag", &tag)?;
        }
        if let Some(kind) = update.device_type {
            self.device_type = require_label("device_type", &kind)?;
        }
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for Device {
    type Id = DeviceId;

    fn id(&self) -> DeviceId {
        self.id
    }
}

/// Input for creating a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDevice {
    pub service_tag: String,
    pub device_type: String,
}

impl NewDevice {
    /// Validate the input and materialize a fresh device.
    pub fn into_device(self, now: DateTime<Utc>) -> DomainResult<Device> {
        Ok(Device {
            id: DeviceId::new(),
            service_tag: require_plain_label("service_tag", &self.service_tag)?,
            device_type: require_label("device_type", &self.device_type)?,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }
}

/// Partial device update (absent fields are left unchanged).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceUpdate {
    #[serde(default)]
    pub service_tag: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
}

/// A device together with the licenses it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceWithLicenses {
    #[serde(flatten)]
    pub device: Device,
    pub licenses: Vec<License>,
}
