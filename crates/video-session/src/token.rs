//! Access token issuance.
//!
//! Tokens are HS256 JWTs signed with the private API secret and carry
//! `user_id`, `iat` and `exp` (see [`common::jwt::VideoClaims`]). A token is
//! minted fresh on every request and never cached.
//!
//! # Security
//!
//! - The API secret is held as `SecretString` and never logged
//! - Only credential presence and lengths appear in failure diagnostics
//! - User ids are logged as correlation hashes

use crate::client::TokenProvider;
use crate::config::VideoCredentials;
use crate::errors::VideoError;
use crate::identity::SessionContext;
use crate::observability::{hash_for_correlation, metrics};
use common::jwt::VideoClaims;
use common::secret::{ExposeSecret, SecretString};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

/// A signed access token and the window it is valid for.
#[derive(Clone)]
pub struct AccessToken {
    pub token: SecretString,
    pub user_id: String,
    /// Unix epoch seconds.
    pub issued_at: i64,
    /// Unix epoch seconds.
    pub expires_at: i64,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("user_id", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Mints access tokens for the identity in a [`SessionContext`].
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    credentials: VideoCredentials,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(credentials: VideoCredentials) -> Self {
        Self { credentials }
    }

    /// Issue a token for the signed-in user, valid from one minute ago until
    /// 24 hours from now.
    ///
    /// # Errors
    ///
    /// - `VideoError::Unauthenticated` - no loaded identity in `ctx`
    ///   (checked before credentials)
    /// - `VideoError::Configuration` - API key or secret missing
    /// - `VideoError::Signing` - the signer rejected the claims
    #[instrument(skip_all)]
    pub fn issue_token(&self, ctx: &SessionContext) -> Result<AccessToken, VideoError> {
        let start = Instant::now();
        let result = self.sign_for(ctx);

        match &result {
            Ok(token) => {
                metrics::record_token_issuance("success", start.elapsed());
                let now = chrono::Utc::now().timestamp();
                info!(
                    target: "vs.token.issuer",
                    user = %hash_for_correlation(&token.user_id),
                    expires_in_minutes = (token.expires_at - now) / 60,
                    token_length = token.token.expose_secret().len(),
                    "Token generated successfully"
                );
            }
            Err(e) => {
                metrics::record_token_issuance("error", start.elapsed());
                let api_key = self.credentials.api_key.as_deref().unwrap_or_default();
                let api_secret_len = self
                    .credentials
                    .api_secret
                    .as_ref()
                    .map_or(0, |s| s.expose_secret().len());
                error!(
                    target: "vs.token.issuer",
                    error = %e,
                    api_key_present = !api_key.is_empty(),
                    api_secret_present = api_secret_len > 0,
                    api_key_length = api_key.len(),
                    api_secret_length = api_secret_len,
                    "Token issuance failed"
                );
            }
        }

        result
    }

    fn sign_for(&self, ctx: &SessionContext) -> Result<AccessToken, VideoError> {
        let identity = ctx.loaded_identity().ok_or(VideoError::Unauthenticated)?;

        if self
            .credentials
            .api_key
            .as_deref()
            .map_or(true, str::is_empty)
        {
            return Err(VideoError::Configuration(
                "video API key is missing".to_string(),
            ));
        }

        let secret = self
            .credentials
            .api_secret
            .as_ref()
            .filter(|s| !s.expose_secret().is_empty())
            .ok_or_else(|| VideoError::Configuration("video API secret is missing".to_string()))?;

        let claims = VideoClaims::issued_at(identity.id.clone(), chrono::Utc::now().timestamp());
        let token = sign_video_token(&claims, secret)?;

        Ok(AccessToken {
            token,
            user_id: claims.user_id,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }
}

/// Sign claims with HS256 using the API secret.
///
/// # Errors
///
/// Returns `VideoError::Signing` if encoding fails.
#[instrument(skip_all)]
pub fn sign_video_token(
    claims: &VideoClaims,
    secret: &SecretString,
) -> Result<SecretString, VideoError> {
    let mut header = Header::new(Algorithm::HS256);
    header.typ = Some("JWT".to_string());

    let key = EncodingKey::from_secret(secret.expose_secret().as_bytes());

    encode(&header, claims, &key)
        .map(SecretString::from)
        .map_err(|e| VideoError::Signing(format!("JWT signing operation failed: {e}")))
}

/// [`TokenProvider`] that issues tokens for a fixed session context.
///
/// This is the callback handed to video clients: each connect asks it for a
/// fresh token for the user the client was built for.
#[derive(Debug, Clone)]
pub struct SessionTokenProvider {
    issuer: Arc<TokenIssuer>,
    ctx: SessionContext,
}

impl SessionTokenProvider {
    #[must_use]
    pub fn new(issuer: Arc<TokenIssuer>, ctx: SessionContext) -> Self {
        Self { issuer, ctx }
    }
}

#[async_trait::async_trait]
impl TokenProvider for SessionTokenProvider {
    async fn provide_token(&self) -> Result<SecretString, VideoError> {
        self.issuer.issue_token(&self.ctx).map(|t| t.token)
    }
}
