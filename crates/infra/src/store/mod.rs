//! Persistence gateway for devices, licenses and users.
//!
//! `InventoryStore` is the only way the rest of the system touches stored
//! state. Two implementations exist:
//!
//! - [`InMemoryInventoryStore`]: `RwLock`-guarded maps for dev and tests
//! - [`PostgresInventoryStore`]: sqlx-backed, schema created on startup
//!
//! Both share the same observable semantics:
//!
//! - soft-deleted devices are invisible to every device lookup and listing
//! - deleting a device removes its licenses
//! - a license can only point at an existing, non-deleted device
//! - service tags are unique among live devices, emails among users
//! - `licenses_expiring_before` orders by expiration date, then id

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

use licensedesk_core::{
    Device, DeviceId, DeviceUpdate, DeviceWithLicenses, DomainError, License, LicenseId,
    LicenseUpdate, NewDevice, NewLicense, User, UserId,
};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound(entity) => StoreError::NotFound(entity),
            DomainError::Conflict(msg) => StoreError::Conflict(msg),
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => StoreError::Validation(msg),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Offset pagination for listings.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Page {
    pub skip: usize,
    pub limit: usize,
}

impl Page {
    pub const DEFAULT_LIMIT: usize = 100;
    pub const MAX_LIMIT: usize = 1000;

    pub fn new(skip: Option<usize>, limit: Option<usize>) -> Self {
        Self {
            skip: skip.unwrap_or(0),
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).min(Self::MAX_LIMIT),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing<T> {
    pub data: Vec<T>,
    pub count: usize,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceStats {
    pub total: u64,
    /// Devices holding at least one license that has not expired.
    pub active: u64,
    pub inactive: u64,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LicenseStats {
    pub total: u64,
    pub active: u64,
    pub expired: u64,
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn create_device(&self, new: NewDevice, now: DateTime<Utc>) -> StoreResult<Device>;

    async fn get_device(&self, id: DeviceId) -> StoreResult<Option<Device>>;

    async fn get_device_with_licenses(&self, id: DeviceId) -> StoreResult<Option<DeviceWithLicenses>>;

    async fn list_devices(&self, page: Page) -> StoreResult<Listing<Device>>;

    /// Live devices with their licenses, filtered by exact service tag.
    /// `None` returns every live device. Ordered by device id.
    async fn search_devices(&self, service_tag: Option<&str>) -> StoreResult<Vec<DeviceWithLicenses>>;

    async fn update_device(
        &self,
        id: DeviceId,
        update: DeviceUpdate,
        now: DateTime<Utc>,
    ) -> StoreResult<Device>;

    /// Soft-delete a device and hard-delete the licenses it owns.
    async fn delete_device(&self, id: DeviceId, now: DateTime<Utc>) -> StoreResult<()>;

    async fn device_stats(&self, now: DateTime<Utc>) -> StoreResult<DeviceStats>;

    async fn create_license(&self, new: NewLicense, now: DateTime<Utc>) -> StoreResult<License>;

    async fn get_license(&self, id: LicenseId) -> StoreResult<Option<License>>;

    async fn list_licenses(&self, page: Page) -> StoreResult<Listing<License>>;

    /// Licenses filtered by exact license type; `None` returns all. Ordered by id.
    async fn search_licenses(&self, license_type: Option<&str>) -> StoreResult<Vec<License>>;

    async fn update_license(
        &self,
        id: LicenseId,
        update: LicenseUpdate,
        now: DateTime<Utc>,
    ) -> StoreResult<License>;

    async fn delete_license(&self, id: LicenseId) -> StoreResult<()>;

    /// Licenses whose expiration date is on or before `cutoff`, expired ones
    /// included, ordered by expiration date then id.
    async fn licenses_expiring_before(&self, cutoff: NaiveDate) -> StoreResult<Vec<License>>;

    async fn license_stats(&self, now: DateTime<Utc>) -> StoreResult<LicenseStats>;

    async fn create_user(&self, user: User) -> StoreResult<User>;

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>>;

    /// Lookup by normalized (lowercase) email.
    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Store or clear (`None`) the user's TOTP secret.
    async fn set_mfa_secret(
        &self,
        id: UserId,
        secret: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<User>;
}
