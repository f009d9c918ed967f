//! Process configuration from environment variables.
//!
//! Every variable has a default; insecure or degraded defaults are logged at
//! `warn` when they are used.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use licensedesk_infra::SmtpConfig;
use licensedesk_infra::delivery::smtp::DEFAULT_SMTP_PORT;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_JWT_SECRET: &str = "dev-secret";
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_TOTP_ISSUER: &str = "LicenseDesk";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    /// `None` disables the background scanner.
    pub notification_email: Option<String>,
    /// `None` selects the recording channel (messages are logged, not sent).
    pub smtp: Option<SmtpConfig>,
    pub scan_interval: Duration,
    pub scan_timeout: Duration,
    pub totp_issuer: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source (`None` = unset). Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEFAULT_JWT_SECRET.to_string()
        });

        let database_url = get("DATABASE_URL");
        if database_url.is_none() {
            tracing::warn!("DATABASE_URL not set; using in-memory store");
        }

        let notification_email = get("NOTIFICATION_EMAIL");
        if notification_email.is_none() {
            tracing::warn!("NOTIFICATION_EMAIL not set; expiration scanner will not run");
        }

        let smtp = match get("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_or(&get, "SMTP_PORT", DEFAULT_SMTP_PORT)?,
                username: get("SMTP_USERNAME"),
                password: get("SMTP_PASSWORD"),
                from: get("SMTP_FROM").context("SMTP_FROM is required when SMTP_HOST is set")?,
                starttls: parse_or(&get, "SMTP_TLS", true)?,
            }),
            None => {
                tracing::warn!("SMTP_HOST not set; outbound mail is disabled");
                None
            }
        };

        let token_ttl_secs: i64 = parse_or(&get, "TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS)?;
        anyhow::ensure!(token_ttl_secs > 0, "TOKEN_TTL_SECS must be positive");

        let scan_interval_secs: u64 = parse_or(&get, "SCAN_INTERVAL_SECS", DEFAULT_SCAN_INTERVAL_SECS)?;
        anyhow::ensure!(scan_interval_secs > 0, "SCAN_INTERVAL_SECS must be positive");

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            jwt_secret,
            token_ttl: chrono::Duration::seconds(token_ttl_secs),
            database_url,
            notification_email,
            smtp,
            scan_interval: Duration::from_secs(scan_interval_secs),
            scan_timeout: Duration::from_secs(parse_or(&get, "SCAN_TIMEOUT_SECS", DEFAULT_SCAN_TIMEOUT_SECS)?),
            totp_issuer: get("TOTP_ISSUER").unwrap_or_else(|| DEFAULT_TOTP_ISSUER.to_string()),
        })
    }

    /// In-memory store, no SMTP, no scanner recipient.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            jwt_secret: jwt_secret.to_string(),
            token_ttl: chrono::Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
            database_url: None,
            notification_email: None,
            smtp: None,
            scan_interval: Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS),
            scan_timeout: Duration::from_secs(DEFAULT_SCAN_TIMEOUT_SECS),
            totp_issuer: DEFAULT_TOTP_ISSUER.to_string(),
        }
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(name) {
        Some(raw) => raw.parse::<T>().with_context(|| format!("invalid {name}: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(cfg.jwt_secret, DEFAULT_JWT_SECRET);
        assert_eq!(cfg.token_ttl, chrono::Duration::hours(1));
        assert_eq!(cfg.scan_interval, Duration::from_secs(86_400));
        assert_eq!(cfg.scan_timeout, Duration::from_secs(60));
        assert!(cfg.database_url.is_none());
        assert!(cfg.notification_email.is_none());
        assert!(cfg.smtp.is_none());
        assert_eq!(cfg.totp_issuer, "LicenseDesk");
    }

    #[test]
    fn smtp_settings_are_read() {
        let cfg = config(&[
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_FROM", "noreply@example.com"),
            ("SMTP_PORT", "2525"),
            ("SMTP_TLS", "false"),
            ("SMTP_USERNAME", "mailer"),
        ])
        .unwrap();
        let smtp = cfg.smtp.unwrap();
        assert_eq!(smtp.host, "smtp.example.com");
        assert_eq!(smtp.port, 2525);
        assert!(!smtp.starttls);
        assert_eq!(smtp.username.as_deref(), Some("mailer"));
        assert_eq!(smtp.password, None);
    }

    #[test]
    fn smtp_host_without_sender_is_rejected() {
        assert!(config(&[("SMTP_HOST", "smtp.example.com")]).is_err());
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        assert!(config(&[("SCAN_INTERVAL_SECS", "daily")]).is_err());
        assert!(config(&[("SCAN_INTERVAL_SECS", "0")]).is_err());
        assert!(config(&[("TOKEN_TTL_SECS", "-5")]).is_err());
    }

    #[test]
    fn blank_values_count_as_unset() {
        let cfg = config(&[("NOTIFICATION_EMAIL", "  "), ("BIND_ADDR", "127.0.0.1:9000")]).unwrap();
        assert!(cfg.notification_email.is_none());
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
    }
}
