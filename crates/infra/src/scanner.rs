//! Expiration scanner: periodic notification about licenses nearing expiry.
//!
//! Each tick captures `now` once, queries licenses expiring on or before
//! `now + 30 days`, keeps the ones strictly inside the window, resolves each
//! owning device's service tag, renders the CSV report and mails it to the
//! configured recipient. No state is carried between ticks: a license that is
//! still expiring is reported again on the next run.
//!
//! Failures never leave the tick. A failed query ends the tick, a failed
//! delivery is logged and not retried until the next tick.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, timeout};
use tracing::{debug, error, info, warn};

use licensedesk_core::{
    DeviceId, EXPIRATION_WINDOW_DAYS, ExpiringLicenseReport, ExpiringLicenseRow, License,
    is_expiring, query_cutoff,
};
use licensedesk_reports::expiring_licenses_csv;

use crate::delivery::{Attachment, DeliveryChannel, OutboundMessage};
use crate::store::InventoryStore;

pub const NOTICE_SUBJECT: &str = "License Expiration Notice";

/// Scanner settings.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Time between ticks.
    pub interval: Duration,
    /// Deadline for each persistence or delivery call inside a tick.
    pub call_timeout: Duration,
    /// Notification address for the report.
    pub recipient: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(24 * 60 * 60),
            call_timeout: Duration::from_secs(60),
            recipient: String::new(),
        }
    }
}

/// What a single tick did.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Nothing inside the window; no report, no message.
    Empty,
    Delivered { count: usize },
    /// Report built but the message was not accepted.
    DeliveryFailed { count: usize },
    /// The license query failed or timed out.
    QueryFailed,
}

impl ScanOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ScanOutcome::Empty => "empty",
            ScanOutcome::Delivered { .. } => "delivered",
            ScanOutcome::DeliveryFailed { .. } => "delivery_failed",
            ScanOutcome::QueryFailed => "query_failed",
        }
    }

    pub fn license_count(&self) -> usize {
        match self {
            ScanOutcome::Delivered { count } | ScanOutcome::DeliveryFailed { count } => *count,
            ScanOutcome::Empty | ScanOutcome::QueryFailed => 0,
        }
    }
}

#[derive(Clone)]
pub struct ExpirationScanner {
    config: ScannerConfig,
    store: Arc<dyn InventoryStore>,
    channel: Arc<dyn DeliveryChannel>,
}

/// Handle for the running scanner task.
#[derive(Debug)]
pub struct ExpirationScannerHandle {
    shutdown: watch::Sender<bool>,
    join: Option<JoinHandle<()>>,
}

impl ExpirationScannerHandle {
    /// Stop scheduling ticks and wait for an in-flight tick to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                error!(error = %e, "expiration scanner task ended abnormally");
            }
        }
    }
}

impl ExpirationScanner {
    pub fn new(
        config: ScannerConfig,
        store: Arc<dyn InventoryStore>,
        channel: Arc<dyn DeliveryChannel>,
    ) -> Self {
        Self {
            config,
            store,
            channel,
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Start the periodic loop on the current runtime. The first tick runs
    /// immediately.
    pub fn spawn(&self) -> ExpirationScannerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scanner = self.clone();
        let join = tokio::spawn(async move { scanner.run(shutdown_rx).await });

        ExpirationScannerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            recipient = %self.config.recipient,
            "expiration scanner started"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                // Shutdown has priority over a due tick.
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    let outcome = self.scan_once(Utc::now()).await;
                    debug!(outcome = outcome.label(), licenses = outcome.license_count(), "expiration scan tick finished");
                }
            }
        }

        info!("expiration scanner stopped");
    }

    /// Run one scan at `now`. Never fails; the outcome says what happened.
    pub async fn scan_once(&self, now: DateTime<Utc>) -> ScanOutcome {
        let cutoff = query_cutoff(now);
        let candidates = match timeout(
            self.config.call_timeout,
            self.store.licenses_expiring_before(cutoff),
        )
        .await
        {
            Ok(Ok(licenses)) => licenses,
            Ok(Err(e)) => {
                error!(error = %e, %cutoff, "expiring license query failed");
                return ScanOutcome::QueryFailed;
            }
            Err(_) => {
                error!(
                    timeout_secs = self.config.call_timeout.as_secs(),
                    %cutoff,
                    "expiring license query timed out"
                );
                return ScanOutcome::QueryFailed;
            }
        };

        let expiring: Vec<License> = candidates
            .into_iter()
            .filter(|l| is_expiring(l.expiration_date, now))
            .collect();

        if expiring.is_empty() {
            debug!(%now, "no licenses inside the expiration window");
            return ScanOutcome::Empty;
        }

        let report = self.build_report(expiring, now).await;
        let count = report.len();
        let csv = expiring_licenses_csv(&report);

        if self.config.recipient.trim().is_empty() {
            warn!(licenses = count, "no notification recipient configured; report not sent");
            return ScanOutcome::DeliveryFailed { count };
        }

        let message = OutboundMessage {
            to: self.config.recipient.clone(),
            subject: NOTICE_SUBJECT.to_string(),
            body: format!(
                "{count} license(s) expire within the next {EXPIRATION_WINDOW_DAYS} days or have already expired. The attached report lists them."
            ),
            attachment: Some(Attachment::from(csv)),
        };

        match timeout(self.config.call_timeout, self.channel.send(message)).await {
            Ok(Ok(())) => {
                info!(licenses = count, to = %self.config.recipient, "expiring license report delivered");
                ScanOutcome::Delivered { count }
            }
            Ok(Err(e)) => {
                error!(error = %e, licenses = count, "expiring license report delivery failed");
                ScanOutcome::DeliveryFailed { count }
            }
            Err(_) => {
                error!(
                    timeout_secs = self.config.call_timeout.as_secs(),
                    licenses = count,
                    "expiring license report delivery timed out"
                );
                ScanOutcome::DeliveryFailed { count }
            }
        }
    }

    /// Rows in query order. Unresolvable devices give an empty service tag.
    async fn build_report(&self, licenses: Vec<License>, now: DateTime<Utc>) -> ExpiringLicenseReport {
        let mut tags: HashMap<DeviceId, String> = HashMap::new();
        let mut rows = Vec::with_capacity(licenses.len());

        for license in licenses {
            let device_service_tag = match license.device_id {
                Some(device_id) => match tags.get(&device_id) {
                    Some(tag) => tag.clone(),
                    None => {
                        let tag = self.service_tag(device_id).await;
                        tags.insert(device_id, tag.clone());
                        tag
                    }
                },
                None => String::new(),
            };

            rows.push(ExpiringLicenseRow {
                license_id: license.id,
                device_service_tag,
                license_type: license.license_type,
                expiration_date: license.expiration_date,
            });
        }

        ExpiringLicenseReport::new(now, rows)
    }

    async fn service_tag(&self, device_id: DeviceId) -> String {
        match timeout(self.config.call_timeout, self.store.get_device(device_id)).await {
            Ok(Ok(Some(device))) => device.service_tag,
            Ok(Ok(None)) => {
                warn!(device_id = %device_id, "license owner not found");
                String::new()
            }
            Ok(Err(e)) => {
                warn!(device_id = %device_id, error = %e, "license owner lookup failed");
                String::new()
            }
            Err(_) => {
                warn!(device_id = %device_id, "license owner lookup timed out");
                String::new()
            }
        }
    }
}
