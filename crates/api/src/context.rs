use licensedesk_auth::JwtClaims;
use licensedesk_core::UserId;

/// Authenticated caller, derived from a validated access token.
///
/// Present on every request that passed the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    user_id: UserId,
    email: String,
}

impl UserContext {
    pub fn new(user_id: UserId, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

impl From<JwtClaims> for UserContext {
    fn from(claims: JwtClaims) -> Self {
        Self::new(claims.sub, claims.email)
    }
}
