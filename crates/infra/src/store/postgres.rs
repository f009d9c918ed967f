//! Postgres-backed inventory store.
//!
//! Tables are created on startup with `CREATE TABLE IF NOT EXISTS`. Service
//! tag uniqueness is a partial unique index over live (non-deleted) devices,
//! so a soft-deleted device releases its tag.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use licensedesk_core::{
    Device, DeviceId, DeviceUpdate, DeviceWithLicenses, License, LicenseId, LicenseUpdate,
    NewDevice, NewLicense, User, UserId,
};

use super::{DeviceStats, InventoryStore, LicenseStats, Listing, Page, StoreError, StoreResult};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS devices (
        id UUID PRIMARY KEY,
        service_tag TEXT NOT NULL,
        device_type TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        deleted_at TIMESTAMPTZ NULL
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS devices_live_service_tag
        ON devices (service_tag) WHERE deleted_at IS NULL
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS licenses (
        id UUID PRIMARY KEY,
        license_type TEXT NOT NULL,
        expiration_date DATE NOT NULL,
        device_id UUID NULL REFERENCES devices (id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS licenses_expiration
        ON licenses (expiration_date, id)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS licenses_device
        ON licenses (device_id)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        mfa_secret TEXT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
];

const DEVICE_COLUMNS: &str = "id, service_tag, device_type, created_at, updated_at, deleted_at";
const LICENSE_COLUMNS: &str = "id, license_type, expiration_date, device_id, created_at, updated_at";
const USER_COLUMNS: &str = "id, email, password_hash, mfa_secret, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect, then make sure the schema exists.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        let store = Self::new(pool);
        store.init_schema().await?;
        Ok(store)
    }

    #[instrument(skip(self), err)]
    pub async fn init_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("init_schema", e))?;
        }
        Ok(())
    }

    async fn fetch_live_device(
        tx: &mut Transaction<'_, Postgres>,
        id: DeviceId,
    ) -> StoreResult<Option<Device>> {
        let row = sqlx::query(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("fetch_live_device", e))?;

        row.as_ref().map(device_from_row).transpose().map_err(|e| map_sqlx_error("decode_device", e))
    }

    async fn require_live_device(
        tx: &mut Transaction<'_, Postgres>,
        id: Option<DeviceId>,
    ) -> StoreResult<()> {
        let id = id.ok_or_else(|| StoreError::Validation("device_id is required".to_string()))?;
        match Self::fetch_live_device(tx, id).await? {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound("device")),
        }
    }

    async fn begin(&self, operation: &str) -> StoreResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(|e| map_sqlx_error(operation, e))
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    #[instrument(skip(self, new), err)]
    async fn create_device(&self, new: NewDevice, now: DateTime<Utc>) -> StoreResult<Device> {
        let device = new.into_device(now)?;
        sqlx::query(
            r#"
            INSERT INTO devices (id, service_tag, device_type, created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, NULL)
            "#,
        )
        .bind(device.id.as_uuid())
        .bind(&device.service_tag)
        .bind(&device.device_type)
        .bind(device.created_at)
        .bind(device.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_device", e))?;
        Ok(device)
    }

    #[instrument(skip(self), err)]
    async fn get_device(&self, id: DeviceId) -> StoreResult<Option<Device>> {
        let row = sqlx::query(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_device", e))?;

        row.as_ref()
            .map(device_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("get_device", e))
    }

    #[instrument(skip(self), err)]
    async fn get_device_with_licenses(&self, id: DeviceId) -> StoreResult<Option<DeviceWithLicenses>> {
        let Some(device) = self.get_device(id).await? else {
            return Ok(None);
        };

        let rows = sqlx::query(&format!(
            "SELECT {LICENSE_COLUMNS} FROM licenses WHERE device_id = $1 ORDER BY expiration_date ASC, id ASC"
        ))
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_device_licenses", e))?;

        let licenses = rows
            .iter()
            .map(license_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("get_device_licenses", e))?;

        Ok(Some(DeviceWithLicenses { device, licenses }))
    }

    #[instrument(skip(self), err)]
    async fn search_devices(&self, service_tag: Option<&str>) -> StoreResult<Vec<DeviceWithLicenses>> {
        let rows = sqlx::query(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices \
             WHERE deleted_at IS NULL AND ($1::TEXT IS NULL OR service_tag = $1) \
             ORDER BY id ASC"
        ))
        .bind(service_tag)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("search_devices", e))?;

        let devices = rows
            .iter()
            .map(device_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("search_devices", e))?;

        let ids: Vec<Uuid> = devices.iter().map(|d| *d.id.as_uuid()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {LICENSE_COLUMNS} FROM licenses WHERE device_id = ANY($1) \
             ORDER BY expiration_date ASC, id ASC"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("search_device_licenses", e))?;

        let licenses = rows
            .iter()
            .map(license_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("search_device_licenses", e))?;

        Ok(devices
            .into_iter()
            .map(|device| DeviceWithLicenses {
                licenses: licenses
                    .iter()
                    .filter(|l| l.device_id == Some(device.id))
                    .cloned()
                    .collect(),
                device,
            })
            .collect())
    }

    #[instrument(skip(self), err)]
    async fn list_devices(&self, page: Page) -> StoreResult<Listing<Device>> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM devices WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_devices", e))?;

        let rows = sqlx::query(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices WHERE deleted_at IS NULL ORDER BY id ASC OFFSET $1 LIMIT $2"
        ))
        .bind(page.skip as i64)
        .bind(page.limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_devices", e))?;

        let data = rows
            .iter()
            .map(device_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("list_devices", e))?;

        Ok(Listing {
            data,
            count: count as usize,
        })
    }

    #[instrument(skip(self, update), err)]
    async fn update_device(
        &self,
        id: DeviceId,
        update: DeviceUpdate,
        now: DateTime<Utc>,
    ) -> StoreResult<Device> {
        let mut tx = self.begin("update_device").await?;
        let mut device = Self::fetch_live_device(&mut tx, id)
            .await?
            .ok_or(StoreError::NotFound("device"))?;
        device.apply_update(update, now)?;

        sqlx::query(
            "UPDATE devices SET service_tag = $2, device_type = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(&device.service_tag)
        .bind(&device.device_type)
        .bind(device.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_device", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(device)
    }

    #[instrument(skip(self), err)]
    async fn delete_device(&self, id: DeviceId, now: DateTime<Utc>) -> StoreResult<()> {
        let mut tx = self.begin("delete_device").await?;

        let updated = sqlx::query(
            "UPDATE devices SET deleted_at = $2, updated_at = $2 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id.as_uuid())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("delete_device", e))?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound("device"));
        }

        sqlx::query("DELETE FROM licenses WHERE device_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_device_licenses", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self), err)]
    async fn device_stats(&self, now: DateTime<Utc>) -> StoreResult<DeviceStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (
                    WHERE EXISTS (
                        SELECT 1 FROM licenses l
                        WHERE l.device_id = d.id AND l.expiration_date > $1
                    )
                ) AS active
            FROM devices d
            WHERE d.deleted_at IS NULL
            "#,
        )
        .bind(now.date_naive())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("device_stats", e))?;

        let (total, active) = counts(&row, "active").map_err(|e| map_sqlx_error("device_stats", e))?;
        Ok(DeviceStats {
            total,
            active,
            inactive: total - active,
        })
    }

    #[instrument(skip(self, new), err)]
    async fn create_license(&self, new: NewLicense, now: DateTime<Utc>) -> StoreResult<License> {
        let license = new.into_license(now)?;
        let mut tx = self.begin("create_license").await?;
        Self::require_live_device(&mut tx, license.device_id).await?;

        sqlx::query(
            r#"
            INSERT INTO licenses (id, license_type, expiration_date, device_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(license.id.as_uuid())
        .bind(&license.license_type)
        .bind(license.expiration_date)
        .bind(license.device_id.map(Uuid::from))
        .bind(license.created_at)
        .bind(license.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("create_license", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(license)
    }

    #[instrument(skip(self), err)]
    async fn get_license(&self, id: LicenseId) -> StoreResult<Option<License>> {
        let row = sqlx::query(&format!("SELECT {LICENSE_COLUMNS} FROM licenses WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_license", e))?;

        row.as_ref()
            .map(license_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("get_license", e))
    }

    #[instrument(skip(self), err)]
    async fn list_licenses(&self, page: Page) -> StoreResult<Listing<License>> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM licenses")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_licenses", e))?;

        let rows = sqlx::query(&format!(
            "SELECT {LICENSE_COLUMNS} FROM licenses ORDER BY id ASC OFFSET $1 LIMIT $2"
        ))
        .bind(page.skip as i64)
        .bind(page.limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_licenses", e))?;

        let data = rows
            .iter()
            .map(license_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("list_licenses", e))?;

        Ok(Listing {
            data,
            count: count as usize,
        })
    }

    #[instrument(skip(self), err)]
    async fn search_licenses(&self, license_type: Option<&str>) -> StoreResult<Vec<License>> {
        let rows = sqlx::query(&format!(
            "SELECT {LICENSE_COLUMNS} FROM licenses \
             WHERE ($1::TEXT IS NULL OR license_type = $1) ORDER BY id ASC"
        ))
        .bind(license_type)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("search_licenses", e))?;

        rows.iter()
            .map(license_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("search_licenses", e))
    }

    #[instrument(skip(self, update), err)]
    async fn update_license(
        &self,
        id: LicenseId,
        update: LicenseUpdate,
        now: DateTime<Utc>,
    ) -> StoreResult<License> {
        let mut tx = self.begin("update_license").await?;

        let row = sqlx::query(&format!(
            "SELECT {LICENSE_COLUMNS} FROM licenses WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_license", e))?
        .ok_or(StoreError::NotFound("license"))?;
        let mut license = license_from_row(&row).map_err(|e| map_sqlx_error("update_license", e))?;

        if update.device_id.is_some() {
            Self::require_live_device(&mut tx, update.device_id).await?;
        }
        license.apply_update(update, now)?;

        sqlx::query(
            r#"
            UPDATE licenses
            SET license_type = $2, expiration_date = $3, device_id = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(&license.license_type)
        .bind(license.expiration_date)
        .bind(license.device_id.map(Uuid::from))
        .bind(license.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_license", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(license)
    }

    #[instrument(skip(self), err)]
    async fn delete_license(&self, id: LicenseId) -> StoreResult<()> {
        let deleted = sqlx::query("DELETE FROM licenses WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_license", e))?;

        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound("license"));
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn licenses_expiring_before(&self, cutoff: NaiveDate) -> StoreResult<Vec<License>> {
        let rows = sqlx::query(&format!(
            "SELECT {LICENSE_COLUMNS} FROM licenses WHERE expiration_date <= $1 ORDER BY expiration_date ASC, id ASC"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("licenses_expiring_before", e))?;

        rows.iter()
            .map(license_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("licenses_expiring_before", e))
    }

    #[instrument(skip(self), err)]
    async fn license_stats(&self, now: DateTime<Utc>) -> StoreResult<LicenseStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE expiration_date <= $1) AS expired
            FROM licenses
            "#,
        )
        .bind(now.date_naive())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("license_stats", e))?;

        let (total, expired) = counts(&row, "expired").map_err(|e| map_sqlx_error("license_stats", e))?;
        Ok(LicenseStats {
            total,
            active: total - expired,
            expired,
        })
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn create_user(&self, user: User) -> StoreResult<User> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, mfa_secret, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.mfa_secret.as_deref())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_user", e))?;
        Ok(user)
    }

    #[instrument(skip(self), err)]
    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user", e))?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("get_user", e))
    }

    #[instrument(skip(self, email), err)]
    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user_by_email", e))?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("get_user_by_email", e))
    }

    #[instrument(skip(self, secret), err)]
    async fn set_mfa_secret(
        &self,
        id: UserId,
        secret: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<User> {
        let row = sqlx::query(&format!(
            "UPDATE users SET mfa_secret = $2, updated_at = $3 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(secret)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_mfa_secret", e))?
        .ok_or(StoreError::NotFound("user"))?;

        user_from_row(&row).map_err(|e| map_sqlx_error("set_mfa_secret", e))
    }
}

fn device_from_row(row: &PgRow) -> Result<Device, sqlx::Error> {
    Ok(Device {
        id: DeviceId::from_uuid(row.try_get("id")?),
        service_tag: row.try_get("service_tag")?,
        device_type: row.try_get("device_type")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn license_from_row(row: &PgRow) -> Result<License, sqlx::Error> {
    let device_id: Option<Uuid> = row.try_get("device_id")?;
    Ok(License {
        id: LicenseId::from_uuid(row.try_get("id")?),
        license_type: row.try_get("license_type")?,
        expiration_date: row.try_get("expiration_date")?,
        device_id: device_id.map(DeviceId::from_uuid),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: UserId::from_uuid(row.try_get("id")?),
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        mfa_secret: row.try_get("mfa_secret")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// `(total, <subset column>)` from a stats row.
fn counts(row: &PgRow, subset: &str) -> Result<(u64, u64), sqlx::Error> {
    let total: i64 = row.try_get("total")?;
    let part: i64 = row.try_get(subset)?;
    Ok((total.max(0) as u64, part.max(0) as u64))
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Unique violation (service tag, email)
                Some("23505") => StoreError::Conflict(msg),
                // Foreign key violation (license pointing at a missing device)
                Some("23503") => StoreError::NotFound("device"),
                // Check / not-null violation
                Some("23514") | Some("23502") => StoreError::Validation(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {}", operation)),
        sqlx::Error::PoolTimedOut => StoreError::Backend(format!("connection pool timed out in {}", operation)),
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
