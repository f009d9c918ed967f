//! Service wiring: store, delivery channel, auth primitives and the report
//! pipelines built on top of them.

use std::sync::Arc;

use anyhow::Context;

use licensedesk_auth::Hs256Jwt;
use licensedesk_infra::{
    DeliveryChannel, DisabledDeliveryChannel, ExpirationScanner, ExportService,
    InMemoryInventoryStore, InventoryStore, PostgresInventoryStore, ScannerConfig,
    SmtpDeliveryChannel,
};

use crate::config::AppConfig;

pub struct AppServices {
    pub store: Arc<dyn InventoryStore>,
    pub jwt: Arc<Hs256Jwt>,
    pub exports: ExportService,
    pub scanner: ExpirationScanner,
    pub totp_issuer: String,
}

impl AppServices {
    /// Assemble services around an existing store and channel.
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn InventoryStore>,
        channel: Arc<dyn DeliveryChannel>,
    ) -> Self {
        let scanner = ExpirationScanner::new(
            ScannerConfig {
                interval: config.scan_interval,
                call_timeout: config.scan_timeout,
                recipient: config.notification_email.clone().unwrap_or_default(),
            },
            store.clone(),
            channel.clone(),
        );

        Self {
            jwt: Arc::new(Hs256Jwt::new(config.jwt_secret.as_bytes(), config.token_ttl)),
            exports: ExportService::new(store.clone(), channel, config.scan_timeout),
            scanner,
            store,
            totp_issuer: config.totp_issuer.clone(),
        }
    }
}

/// Build services from configuration: Postgres when `DATABASE_URL` is set,
/// SMTP when `SMTP_HOST` is set. Without SMTP every delivery fails.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let store: Arc<dyn InventoryStore> = match &config.database_url {
        Some(url) => {
            let store = PostgresInventoryStore::connect(url)
                .await
                .context("failed to connect to postgres")?;
            tracing::info!("using postgres inventory store");
            Arc::new(store)
        }
        None => Arc::new(InMemoryInventoryStore::new()),
    };

    let channel: Arc<dyn DeliveryChannel> = match &config.smtp {
        Some(smtp) => {
            let channel = SmtpDeliveryChannel::new(smtp.clone()).context("invalid SMTP configuration")?;
            tracing::info!(host = %smtp.host, port = smtp.port, "using smtp delivery channel");
            Arc::new(channel)
        }
        None => Arc::new(DisabledDeliveryChannel::new()),
    };

    Ok(AppServices::new(config, store, channel))
}
