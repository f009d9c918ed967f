//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// missing entities, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested entity was not found.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A uniqueness rule was violated (duplicate service tag, email, ...).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound(entity)
    }
}

/// Maximum length of free-text identifiers (service tag, device/license type).
pub const MAX_LABEL_LEN: usize = 255;

/// Trim and validate a required label field.
pub fn require_label(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} must not be empty")));
    }
    if trimmed.chars().count() > MAX_LABEL_LEN {
        return Err(DomainError::validation(format!(
            "{field} must be at most {MAX_LABEL_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Like [`require_label`], but also rejects commas and line breaks.
///
/// Used for values that end up as fields of the plain delimited report.
pub fn require_plain_label(field: &str, value: &str) -> DomainResult<String> {
    let label = require_label(field, value)?;
    if label.contains([',', '\n', '\r']) {
        return Err(DomainError::validation(format!(
            "{field} must not contain commas or line breaks"
        )));
    }
    Ok(label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_is_trimmed() {
        assert_eq!(require_label("service_tag", "  SVC001 ").unwrap(), "SVC001");
    }

    #[test]
    fn blank_label_is_rejected() {
        let err = require_label("device_type", "   ").unwrap_err();
        assert_eq!(err, DomainError::validation("device_type must not be empty"));
    }

    #[test]
    fn plain_label_rejects_delimiters() {
        for bad in ["SVC,001", "Office\n365", "Office\r365"] {
            assert_eq!(
                require_plain_label("service_tag", bad),
                Err(DomainError::validation(
                    "service_tag must not contain commas or line breaks"
                ))
            );
        }
        assert_eq!(require_plain_label("service_tag", " SVC-001 ").unwrap(), "SVC-001");
    }

    #[test]
    fn overlong_label_is_rejected() {
        let long = "x".repeat(MAX_LABEL_LEN + 1);
        assert!(matches!(
            require_label("license_type", &long),
            Err(DomainError::Validation(_))
        ));
    }
}
