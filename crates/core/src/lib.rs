//! `licensedesk-core`: domain foundation for the device/license inventory.
//!
//! This crate contains **pure domain** types (no infrastructure concerns):
//! identifiers, entities, validation rules, the expiration window policy and
//! the derived expiring-license report.

pub mod device;
pub mod entity;
pub mod error;
pub mod expiration;
pub mod id;
pub mod license;
pub mod report;
pub mod user;

pub use device::{Device, DeviceUpdate, DeviceWithLicenses, NewDevice};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use expiration::{
    EXPIRATION_WINDOW_DAYS, Urgency, days_until_expiry, expiration_threshold, expires_at, is_expired, is_expiring,
    query_cutoff,
};
pub use id::{DeviceId, LicenseId, UserId};
pub use license::{License, LicenseUpdate, NewLicense};
pub use report::{ExpiringLicenseReport, ExpiringLicenseRow};
pub use user::{NewUser, User, normalize_email};
