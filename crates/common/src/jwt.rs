//! JWT utilities for video service access tokens.
//!
//! This module provides the shared pieces of the token format:
//! - Lifetime and backdating constants for issued tokens
//! - Size limits for DoS prevention
//! - The `VideoClaims` structure (`user_id`, `iat`, `exp`)
//! - HS256 verification used by consumers and tests
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only HS256 is accepted on verification
//! - Generic error messages prevent information leakage
//! - The `user_id` field in `VideoClaims` is redacted in Debug output
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{verify_video_token, VideoClaims};
//!
//! let claims: VideoClaims = verify_video_token(token, &api_secret)?;
//! assert_eq!(claims.user_id, "user_123");
//! ```

use crate::secret::{ExposeSecret, SecretString};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Tokens larger than this are rejected BEFORE any base64 decoding or
/// signature verification.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Lifetime of an issued access token (24 hours).
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 3600);

/// How far `iat` is backdated from the signing time.
///
/// Absorbs clock differences between this host and the video service, which
/// otherwise rejects tokens that appear to be issued in the future.
pub const ISSUED_AT_BACKDATE: Duration = Duration::from_secs(60);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during JWT validation.
///
/// Note: Error messages are intentionally generic to prevent information leakage.
/// Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Signature did not verify against the shared secret.
    #[error("The access token is invalid or expired")]
    InvalidSignature,

    /// Token `exp` is in the past.
    #[error("The access token is invalid or expired")]
    Expired,
}

// =============================================================================
// Claims Types
// =============================================================================

/// Claims carried by a video service access token.
///
/// # Fields
///
/// - `user_id`: Identity the token is issued to
/// - `iat`: Issued-at timestamp (Unix epoch seconds)
/// - `exp`: Expiration timestamp (Unix epoch seconds)
///
/// The `user_id` field is redacted in Debug output.
#[derive(Clone, Serialize, Deserialize)]
pub struct VideoClaims {
    /// External user id - redacted in Debug output.
    pub user_id: String,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,
}

impl fmt::Debug for VideoClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoClaims")
            .field("user_id", &"[REDACTED]")
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .finish()
    }
}

impl VideoClaims {
    /// Build claims for `user_id` valid from `now - ISSUED_AT_BACKDATE`
    /// until `now + TOKEN_LIFETIME`.
    #[must_use]
    pub fn issued_at(user_id: impl Into<String>, now: i64) -> Self {
        #[allow(clippy::cast_possible_wrap)]
        let backdate = ISSUED_AT_BACKDATE.as_secs() as i64;
        #[allow(clippy::cast_possible_wrap)]
        let lifetime = TOKEN_LIFETIME.as_secs() as i64;

        Self {
            user_id: user_id.into(),
            iat: now - backdate,
            exp: now + lifetime,
        }
    }

    /// Length of the validity window in seconds.
    #[must_use]
    pub fn validity_secs(&self) -> i64 {
        self.exp - self.iat
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Verify an HS256 video token against the shared API secret.
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `Expired` - `exp` is in the past
/// - `InvalidSignature` - Signature does not match the secret
/// - `MalformedToken` - Anything else (bad structure, base64, JSON)
pub fn verify_video_token(
    token: &str,
    secret: &SecretString,
) -> Result<VideoClaims, JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.set_required_spec_claims(&["exp"]);

    let key = DecodingKey::from_secret(secret.expose_secret().as_bytes());

    decode::<VideoClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(target: "common.jwt", error = %e, "Token verification failed");
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtValidationError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    JwtValidationError::InvalidSignature
                }
                _ => JwtValidationError::MalformedToken,
            }
        })
}

// =============================================================================
// Tests
// =============================================================================
