//! User account entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use crate::id::UserId;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// A user account.
///
/// Secrets never leave the process through serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Base32 TOTP secret; `None` when MFA is not configured.
    #[serde(skip_serializing, default)]
    pub mfa_secret: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn mfa_enabled(&self) -> bool {
        self.mfa_secret.is_some()
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> UserId {
        self.id
    }
}

/// Registration input (plaintext password, hashed by the auth layer).
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
}

impl NewUser {
    /// Validate the registration and return the normalized (lowercase) email.
    pub fn validate(&self) -> DomainResult<String> {
        let email = normalize_email(&self.email)?;
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DomainError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(email)
    }

    /// Materialize a user from a validated registration and a password hash.
    pub fn into_user(self, password_hash: String, now: DateTime<Utc>) -> DomainResult<User> {
        let email = self.validate()?;
        Ok(User {
            id: UserId::new(),
            email,
            password_hash,
            mfa_secret: None,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Trim + lowercase an email and check its basic shape.
pub fn normalize_email(raw: &str) -> DomainResult<String> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(email)
        }
        _ => Err(DomainError::validation("invalid email address")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_normalized() {
        assert_eq!(normalize_email("  Alice@Example.COM ").unwrap(), "alice@example.com");
    }

    #[test]
    fn malformed_emails_are_rejected() {
        for bad in ["", "alice", "@example.com", "alice@", "a@b@c"] {
            assert!(normalize_email(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn short_password_is_rejected() {
        let input = NewUser {
            email: "bob@example.com".into(),
            password: "short".into(),
        };
        assert!(matches!(input.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn secrets_are_not_serialized() {
        let user = NewUser {
            email: "carol@example.com".into(),
            password: "correct horse".into(),
        }
        .into_user("$argon2id$hash".into(), Utc::now())
        .unwrap();

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("mfa_secret").is_none());
        assert_eq!(json["email"], "carol@example.com");
    }
}
