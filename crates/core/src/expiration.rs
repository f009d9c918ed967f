//! Expiration window policy.
//!
//! A single threshold (30 × 24 hours) drives both the coarse persistence
//! query and the precise in-memory check. Callers capture `now` once and pass
//! it to every function here.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Length of the lookahead window, in days.
pub const EXPIRATION_WINDOW_DAYS: i64 = 30;

/// The lookahead window as a duration (30 × 24 hours).
pub fn expiration_threshold() -> Duration {
    Duration::hours(EXPIRATION_WINDOW_DAYS * 24)
}

/// Instant at which a license with the given expiration date expires
/// (midnight UTC at the start of that day).
pub fn expires_at(expiration_date: NaiveDate) -> DateTime<Utc> {
    expiration_date.and_time(NaiveTime::MIN).and_utc()
}

/// Last expiration date the persistence query must include.
///
/// Every date accepted by [`is_expiring`] is `<=` this cutoff, so the query
/// result is always a superset of the precise filter.
pub fn query_cutoff(now: DateTime<Utc>) -> NaiveDate {
    (now + expiration_threshold()).date_naive()
}

/// Whether the license has expired at `now`: from midnight UTC of its
/// expiration date on. Every expired/active split uses this.
pub fn is_expired(expiration_date: NaiveDate, now: DateTime<Utc>) -> bool {
    expires_at(expiration_date) <= now
}

/// Precise check: `expiration - now` is strictly less than the threshold.
///
/// Already-expired licenses are included.
pub fn is_expiring(expiration_date: NaiveDate, now: DateTime<Utc>) -> bool {
    expires_at(expiration_date) - now < expiration_threshold()
}

/// Whole days between `now` and the expiration instant (negative once expired).
pub fn days_until_expiry(expiration_date: NaiveDate, now: DateTime<Utc>) -> i64 {
    (expires_at(expiration_date) - now).num_days()
}

/// How soon an expiring license needs attention.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    High,
    Medium,
    Low,
}

impl Urgency {
    pub fn from_days(days_until_expiry: i64) -> Self {
        match days_until_expiry {
            d if d <= 7 => Urgency::High,
            d if d <= 14 => Urgency::Medium,
            _ => Urgency::Low,
        }
    }
}
