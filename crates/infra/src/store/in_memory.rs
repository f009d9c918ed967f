use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use licensedesk_core::{
    Device, DeviceId, DeviceUpdate, DeviceWithLicenses, Entity, License, LicenseId, LicenseUpdate,
    NewDevice, NewLicense, User, UserId,
};

use super::{DeviceStats, InventoryStore, LicenseStats, Listing, Page, StoreError, StoreResult};

/// Rows keyed by entity id; iteration is in id order.
#[derive(Debug)]
struct Table<E: Entity> {
    rows: BTreeMap<E::Id, E>,
}

impl<E: Entity + Clone> Table<E> {
    fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }

    fn insert(&mut self, row: E) -> E {
        self.rows.insert(row.id(), row.clone());
        row
    }

    fn get(&self, id: E::Id) -> Option<&E> {
        self.rows.get(&id)
    }

    fn get_mut(&mut self, id: E::Id) -> Option<&mut E> {
        self.rows.get_mut(&id)
    }

    fn remove(&mut self, id: E::Id) -> Option<E> {
        self.rows.remove(&id)
    }

    fn values(&self) -> impl Iterator<Item = &E> {
        self.rows.values()
    }

    fn retain(&mut self, mut keep: impl FnMut(&E) -> bool) {
        self.rows.retain(|_, row| keep(row));
    }
}

#[derive(Debug)]
struct State {
    devices: Table<Device>,
    licenses: Table<License>,
    users: Table<User>,
}

impl State {
    fn live_device(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(id).filter(|d| !d.is_deleted())
    }

    fn tag_taken(&self, tag: &str, except: Option<DeviceId>) -> bool {
        self.devices
            .values()
            .any(|d| !d.is_deleted() && d.service_tag == tag && Some(d.id) != except)
    }

    fn licenses_of(&self, device_id: DeviceId) -> Vec<License> {
        let mut licenses: Vec<License> = self
            .licenses
            .values()
            .filter(|l| l.device_id == Some(device_id))
            .cloned()
            .collect();
        licenses.sort_by_key(|l| (l.expiration_date, l.id));
        licenses
    }

    fn require_live_device(&self, id: Option<DeviceId>) -> StoreResult<()> {
        match id {
            Some(id) if self.live_device(id).is_some() => Ok(()),
            Some(_) => Err(StoreError::NotFound("device")),
            None => Err(StoreError::Validation("device_id is required".to_string())),
        }
    }
}

fn paginate<T: Clone>(rows: Vec<&T>, page: Page) -> Listing<T> {
    let count = rows.len();
    let data = rows
        .into_iter()
        .skip(page.skip)
        .take(page.limit)
        .cloned()
        .collect();
    Listing { data, count }
}

/// In-memory inventory store for tests/dev.
///
/// [`set_unavailable`](Self::set_unavailable) makes every call fail with a
/// backend error, which lets callers exercise outage handling.
#[derive(Debug)]
pub struct InMemoryInventoryStore {
    inner: RwLock<State>,
    unavailable: AtomicBool,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(State {
                devices: Table::new(),
                licenses: Table::new(),
                users: Table::new(),
            }),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("in-memory store marked unavailable".to_string()));
        }
        Ok(())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.check_available()?;
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.check_available()?;
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }
}

impl Default for InMemoryInventoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn create_device(&self, new: NewDevice, now: DateTime<Utc>) -> StoreResult<Device> {
        let device = new.into_device(now)?;
        let mut state = self.write()?;
        if state.tag_taken(&device.service_tag, None) {
            return Err(StoreError::Conflict(format!(
                "service tag {} already exists",
                device.service_tag
            )));
        }
        Ok(state.devices.insert(device))
    }

    async fn get_device(&self, id: DeviceId) -> StoreResult<Option<Device>> {
        Ok(self.read()?.live_device(id).cloned())
    }

    async fn get_device_with_licenses(&self, id: DeviceId) -> StoreResult<Option<DeviceWithLicenses>> {
        let state = self.read()?;
        Ok(state.live_device(id).cloned().map(|device| DeviceWithLicenses {
            licenses: state.licenses_of(device.id),
            device,
        }))
    }

    async fn list_devices(&self, page: Page) -> StoreResult<Listing<Device>> {
        let state = self.read()?;
        let live: Vec<&Device> = state.devices.values().filter(|d| !d.is_deleted()).collect();
        Ok(paginate(live, page))
    }

    async fn search_devices(&self, service_tag: Option<&str>) -> StoreResult<Vec<DeviceWithLicenses>> {
        let state = self.read()?;
        Ok(state
            .devices
            .values()
            .filter(|d| !d.is_deleted())
            .filter(|d| service_tag.is_none_or(|tag| d.service_tag == tag))
            .map(|device| DeviceWithLicenses {
                licenses: state.licenses_of(device.id),
                device: device.clone(),
            })
            .collect())
    }

    async fn update_device(
        &self,
        id: DeviceId,
        update: DeviceUpdate,
        now: DateTime<Utc>,
    ) -> StoreResult<Device> {
        let mut state = self.write()?;
        let mut device = state
            .live_device(id)
            .cloned()
            .ok_or(StoreError::NotFound("device"))?;
        device.apply_update(update, now)?;

        if state.tag_taken(&device.service_tag, Some(id)) {
            return Err(StoreError::Conflict(format!(
                "service tag {} already exists",
                device.service_tag
            )));
        }
        Ok(state.devices.insert(device))
    }

    async fn delete_device(&self, id: DeviceId, now: DateTime<Utc>) -> StoreResult<()> {
        let mut state = self.write()?;
        let device = state
            .devices
            .get_mut(id)
            .filter(|d| !d.is_deleted())
            .ok_or(StoreError::NotFound("device"))?;
        device.deleted_at = Some(now);
        device.updated_at = now;

        state.licenses.retain(|l| l.device_id != Some(id));
        Ok(())
    }

    async fn device_stats(&self, now: DateTime<Utc>) -> StoreResult<DeviceStats> {
        let state = self.read()?;
        let mut stats = DeviceStats::default();
        for device in state.devices.values().filter(|d| !d.is_deleted()) {
            stats.total += 1;
            let active = state
                .licenses
                .values()
                .any(|l| l.device_id == Some(device.id) && !l.is_expired(now));
            if active {
                stats.active += 1;
            }
        }
        stats.inactive = stats.total - stats.active;
        Ok(stats)
    }

    async fn create_license(&self, new: NewLicense, now: DateTime<Utc>) -> StoreResult<License> {
        let license = new.into_license(now)?;
        let mut state = self.write()?;
        state.require_live_device(license.device_id)?;
        Ok(state.licenses.insert(license))
    }

    async fn get_license(&self, id: LicenseId) -> StoreResult<Option<License>> {
        Ok(self.read()?.licenses.get(id).cloned())
    }

    async fn list_licenses(&self, page: Page) -> StoreResult<Listing<License>> {
        let state = self.read()?;
        Ok(paginate(state.licenses.values().collect(), page))
    }

    async fn search_licenses(&self, license_type: Option<&str>) -> StoreResult<Vec<License>> {
        Ok(self
            .read()?
            .licenses
            .values()
            .filter(|l| license_type.is_none_or(|kind| l.license_type == kind))
            .cloned()
            .collect())
    }

    async fn update_license(
        &self,
        id: LicenseId,
        update: LicenseUpdate,
        now: DateTime<Utc>,
    ) -> StoreResult<License> {
        let mut state = self.write()?;
        let mut license = state
            .licenses
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound("license"))?;

        if update.device_id.is_some() {
            state.require_live_device(update.device_id)?;
        }
        license.apply_update(update, now)?;
        Ok(state.licenses.insert(license))
    }

    async fn delete_license(&self, id: LicenseId) -> StoreResult<()> {
        self.write()?
            .licenses
            .remove(id)
            .map(|_| ())
            .ok_or(StoreError::NotFound("license"))
    }

    async fn licenses_expiring_before(&self, cutoff: NaiveDate) -> StoreResult<Vec<License>> {
        let state = self.read()?;
        let mut licenses: Vec<License> = state
            .licenses
            .values()
            .filter(|l| l.expiration_date <= cutoff)
            .cloned()
            .collect();
        licenses.sort_by_key(|l| (l.expiration_date, l.id));
        Ok(licenses)
    }

    async fn license_stats(&self, now: DateTime<Utc>) -> StoreResult<LicenseStats> {
        let state = self.read()?;
        let mut stats = LicenseStats::default();
        for license in state.licenses.values() {
            stats.total += 1;
            if license.is_expired(now) {
                stats.expired += 1;
            } else {
                stats.active += 1;
            }
        }
        Ok(stats)
    }

    async fn create_user(&self, user: User) -> StoreResult<User> {
        let mut state = self.write()?;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!("email {} already registered", user.email)));
        }
        Ok(state.users.insert(user))
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.get(id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn set_mfa_secret(
        &self,
        id: UserId,
        secret: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<User> {
        let mut state = self.write()?;
        let user = state.users.get_mut(id).ok_or(StoreError::NotFound("user"))?;
        user.mfa_secret = secret;
        user.updated_at = now;
        Ok(user.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    async fn device(store: &InMemoryInventoryStore, tag: &str) -> Device {
        store
            .create_device(
                NewDevice {
                    service_tag: tag.into(),
                    device_type: "laptop".into(),
                },
                now(),
            )
            .await
            .unwrap()
    }

    async fn license(store: &InMemoryInventoryStore, device: DeviceId, expires: &str) -> License {
        store
            .create_license(
                NewLicense {
                    license_type: "Office365".into(),
                    expiration_date: date(expires),
                    device_id: Some(device),
                },
                now(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn duplicate_service_tag_conflicts() {
        let store = InMemoryInventoryStore::new();
        device(&store, "SVC001").await;
        let err = store
            .create_device(
                NewDevice {
                    service_tag: " SVC001 ".into(),
                    device_type: "desktop".into(),
                },
                now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn soft_delete_hides_device_and_cascades() {
        let store = InMemoryInventoryStore::new();
        let d = device(&store, "SVC001").await;
        let l = license(&store, d.id, "2030-01-01").await;

        store.delete_device(d.id, now()).await.unwrap();

        assert!(store.get_device(d.id).await.unwrap().is_none());
        assert!(store.get_license(l.id).await.unwrap().is_none());
        assert_eq!(store.list_devices(Page::default()).await.unwrap().count, 0);
        assert!(matches!(
            store.delete_device(d.id, now()).await,
            Err(StoreError::NotFound("device"))
        ));

        // The tag is free again once the device is gone.
        device(&store, "SVC001").await;
    }

    #[tokio::test]
    async fn license_requires_live_device() {
        let store = InMemoryInventoryStore::new();
        let err = store
            .create_license(
                NewLicense {
                    license_type: "Office365".into(),
                    expiration_date: date("2030-01-01"),
                    device_id: Some(DeviceId::new()),
                },
                now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("device")));

        let err = store
            .create_license(
                NewLicense {
                    license_type: "Office365".into(),
                    expiration_date: date("2030-01-01"),
                    device_id: None,
                },
                now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn expiring_query_is_inclusive_and_ordered() {
        let store = InMemoryInventoryStore::new();
        let d = device(&store, "SVC001").await;
        let late = license(&store, d.id, "2024-06-20").await;
        let past = license(&store, d.id, "2024-01-01").await;
        let _outside = license(&store, d.id, "2024-08-01").await;
        let edge = license(&store, d.id, "2024-07-01").await;

        let found = store.licenses_expiring_before(date("2024-07-01")).await.unwrap();
        let ids: Vec<LicenseId> = found.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![past.id, late.id, edge.id]);
    }

    #[tokio::test]
    async fn stats_split_on_expiry() {
        let store = InMemoryInventoryStore::new();
        let a = device(&store, "A").await;
        let b = device(&store, "B").await;
        device(&store, "C").await;
        license(&store, a.id, "2030-01-01").await;
        license(&store, b.id, "2020-01-01").await;

        let devices = store.device_stats(now()).await.unwrap();
        assert_eq!(devices, DeviceStats { total: 3, active: 1, inactive: 2 });

        let licenses = store.license_stats(now()).await.unwrap();
        assert_eq!(licenses, LicenseStats { total: 2, active: 1, expired: 1 });
    }

    #[tokio::test]
    async fn license_expiring_today_counts_as_expired() {
        let store = InMemoryInventoryStore::new();
        let a = device(&store, "A").await;
        let b = device(&store, "B").await;
        license(&store, a.id, "2024-06-01").await;
        license(&store, b.id, "2024-06-02").await;

        let licenses = store.license_stats(now()).await.unwrap();
        assert_eq!(licenses, LicenseStats { total: 2, active: 1, expired: 1 });

        let devices = store.device_stats(now()).await.unwrap();
        assert_eq!(devices, DeviceStats { total: 2, active: 1, inactive: 1 });
    }

    #[tokio::test]
    async fn search_matches_exact_values() {
        let store = InMemoryInventoryStore::new();
        let a = device(&store, "SVC001").await;
        let b = device(&store, "SVC002").await;
        let gone = device(&store, "SVC003").await;
        store.delete_device(gone.id, now()).await.unwrap();
        let owned = license(&store, a.id, "2030-01-01").await;
        store
            .create_license(
                NewLicense {
                    license_type: "Adobe".into(),
                    expiration_date: date("2030-01-01"),
                    device_id: Some(b.id),
                },
                now(),
            )
            .await
            .unwrap();

        let found = store.search_devices(Some("SVC001")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].device.id, a.id);
        assert_eq!(found[0].licenses, vec![owned.clone()]);

        assert!(store.search_devices(Some("SVC00")).await.unwrap().is_empty());
        assert!(store.search_devices(Some("SVC003")).await.unwrap().is_empty());
        assert_eq!(store.search_devices(None).await.unwrap().len(), 2);

        let office = store.search_licenses(Some("Office365")).await.unwrap();
        assert_eq!(office, vec![owned]);
        assert!(store.search_licenses(Some("office365")).await.unwrap().is_empty());
        assert_eq!(store.search_licenses(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn listing_paginates_with_total_count() {
        let store = InMemoryInventoryStore::new();
        for i in 0..5 {
            device(&store, &format!("SVC{i}")).await;
        }
        let page = store.list_devices(Page::new(Some(3), Some(10))).await.unwrap();
        assert_eq!(page.count, 5);
        assert_eq!(page.data.len(), 2);
    }

    #[tokio::test]
    async fn license_can_move_between_devices() {
        let store = InMemoryInventoryStore::new();
        let a = device(&store, "A").await;
        let b = device(&store, "B").await;
        let l = license(&store, a.id, "2030-01-01").await;

        let moved = store
            .update_license(
                l.id,
                LicenseUpdate {
                    device_id: Some(b.id),
                    expiration_date: Some(date("2031-01-01")),
                    ..Default::default()
                },
                now() + Duration::hours(1),
            )
            .await
            .unwrap();
        assert_eq!(moved.device_id, Some(b.id));
        assert_eq!(moved.updated_at, now() + Duration::hours(1));

        let err = store
            .update_license(
                l.id,
                LicenseUpdate {
                    device_id: Some(DeviceId::new()),
                    ..Default::default()
                },
                now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("device")));
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = InMemoryInventoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.licenses_expiring_before(date("2030-01-01")).await,
            Err(StoreError::Backend(_))
        ));
        store.set_unavailable(false);
        assert!(store.licenses_expiring_before(date("2030-01-01")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mfa_secret_round_trip() {
        let store = InMemoryInventoryStore::new();
        let user = licensedesk_core::NewUser {
            email: "alice@example.com".into(),
            password: "password123".into(),
        }
        .into_user("hash".into(), now())
        .unwrap();
        let user = store.create_user(user).await.unwrap();

        let updated = store
            .set_mfa_secret(user.id, Some("SECRET".into()), now())
            .await
            .unwrap();
        assert!(updated.mfa_enabled());

        let found = store.get_user_by_email("alice@example.com").await.unwrap().unwrap();
        assert_eq!(found.mfa_secret.as_deref(), Some("SECRET"));
    }
}
