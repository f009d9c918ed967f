//! `licensedesk-auth`: credential and token primitives.
//!
//! This crate is intentionally decoupled from HTTP and storage: it hashes and
//! verifies passwords, enrolls/verifies TOTP secrets and issues/validates
//! access tokens.

pub mod claims;
pub mod error;
pub mod jwt;
pub mod password;
pub mod totp;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use error::AuthError;
pub use jwt::{Hs256Jwt, JwtValidator};
