//! TOTP (RFC 6238) enrollment and verification for MFA.

use totp_rs::{Algorithm, Secret, TOTP};

use crate::error::AuthError;

const DIGITS: usize = 6;
const SKEW: u8 = 1;
const STEP_SECS: u64 = 30;

/// A freshly generated MFA enrollment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrollment {
    /// Base32 secret, stored on the user record.
    pub secret: String,
    /// `otpauth://` URI for authenticator apps.
    pub otpauth_url: String,
}

fn build(secret_bytes: Vec<u8>, issuer: &str, account: &str) -> Result<TOTP, AuthError> {
    TOTP::new(
        Algorithm::SHA1,
        DIGITS,
        SKEW,
        STEP_SECS,
        secret_bytes,
        Some(issuer.to_string()),
        account.to_string(),
    )
    .map_err(|e| AuthError::Crypto(format!("TOTP init: {e}")))
}

fn decode_secret(base32: &str) -> Result<Vec<u8>, AuthError> {
    Secret::Encoded(base32.to_string())
        .to_bytes()
        .map_err(|e| AuthError::Crypto(format!("secret decode: {e}")))
}

/// Generate a new secret and its otpauth URI.
pub fn generate_enrollment(issuer: &str, account: &str) -> Result<Enrollment, AuthError> {
    let secret = Secret::generate_secret();
    let secret_bytes = secret
        .to_bytes()
        .map_err(|e| AuthError::Crypto(format!("secret bytes: {e}")))?;

    let totp = build(secret_bytes, issuer, account)?;

    Ok(Enrollment {
        secret: secret.to_encoded().to_string(),
        otpauth_url: totp.get_url(),
    })
}

/// Verify a code against a stored base32 secret at the current time.
pub fn verify_code(secret: &str, code: &str, issuer: &str, account: &str) -> Result<bool, AuthError> {
    let totp = build(decode_secret(secret)?, issuer, account)?;
    totp.check_current(code.trim())
        .map_err(|e| AuthError::Crypto(format!("TOTP check: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enrollment_produces_valid_uri() {
        let enrollment = generate_enrollment("LicenseDesk", "alice@example.com").unwrap();
        assert!(!enrollment.secret.is_empty());
        assert!(enrollment.otpauth_url.starts_with("otpauth://totp/"));
        assert!(enrollment.otpauth_url.contains("LicenseDesk"));
    }

    #[test]
    fn current_code_verifies() {
        let enrollment = generate_enrollment("LicenseDesk", "bob@example.com").unwrap();
        let totp = build(
            decode_secret(&enrollment.secret).unwrap(),
            "LicenseDesk",
            "bob@example.com",
        )
        .unwrap();
        let code = totp.generate_current().unwrap();

        assert!(verify_code(&enrollment.secret, &code, "LicenseDesk", "bob@example.com").unwrap());
    }

    #[test]
    fn wrong_code_fails() {
        let enrollment = generate_enrollment("LicenseDesk", "bob@example.com").unwrap();
        // Cannot collide with a real code: TOTP codes are digits only.
        assert!(!verify_code(&enrollment.secret, "abcdef", "LicenseDesk", "bob@example.com").unwrap());
    }

    #[test]
    fn corrupt_secret_is_an_error() {
        assert!(verify_code("!!!", "123456", "LicenseDesk", "bob@example.com").is_err());
    }
}
