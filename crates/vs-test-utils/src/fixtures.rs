//! Test fixtures: identities, credentials, token providers, token checks.

use common::jwt::{verify_video_token, VideoClaims};
use common::secret::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;
use video_session::client::{TokenProvider, VideoClientFactory};
use video_session::config::{ClientOptions, RetryPolicy, VideoCredentials};
use video_session::connection::ConnectionManager;
use video_session::errors::VideoError;
use video_session::identity::{Identity, SessionContext};

/// Public API key used by fixtures.
pub const TEST_API_KEY: &str = "test-api-key";

/// Private API secret used by fixtures.
pub const TEST_API_SECRET: &str = "test-api-secret-0123456789";

/// Fully configured credentials.
#[must_use]
pub fn test_credentials() -> VideoCredentials {
    VideoCredentials {
        api_key: Some(TEST_API_KEY.to_string()),
        api_secret: Some(SecretString::from(TEST_API_SECRET)),
    }
}

#[must_use]
pub fn alice() -> Identity {
    Identity::new("user_alice")
        .with_username("alice")
        .with_image_url("https://img.example.com/alice.png")
}

#[must_use]
pub fn bob() -> Identity {
    Identity::new("user_bob")
}

#[must_use]
pub fn alice_session() -> SessionContext {
    SessionContext::authenticated(alice())
}

#[must_use]
pub fn bob_session() -> SessionContext {
    SessionContext::authenticated(bob())
}

/// Manager over `factory` with the fixture API key, default client options
/// and the default retry policy (3 retries, 2 s apart).
#[must_use]
pub fn test_manager<F: VideoClientFactory>(factory: F) -> ConnectionManager<F> {
    ConnectionManager::new(
        factory,
        Some(TEST_API_KEY.to_string()),
        ClientOptions::default(),
        RetryPolicy::default(),
    )
}

/// Retry policy with a short delay for tests that run on the real clock.
#[must_use]
pub fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        retry_delay: Duration::from_millis(10),
    }
}

/// Token provider returning the same token every time.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider(pub String);

#[async_trait::async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn provide_token(&self) -> Result<SecretString, VideoError> {
        Ok(SecretString::from(self.0.clone()))
    }
}

#[must_use]
pub fn static_token_provider() -> Arc<dyn TokenProvider> {
    Arc::new(StaticTokenProvider("static.test.token".to_string()))
}

/// Verify `token` against the fixture secret and return its claims.
///
/// # Panics
///
/// Panics if the token does not verify.
#[must_use]
pub fn verify_test_token(token: &SecretString) -> VideoClaims {
    verify_video_token(token.expose_secret(), &SecretString::from(TEST_API_SECRET))
        .expect("token should verify with the test secret")
}

/// Assert a token carries `user_id` and the 24h + 60s issuance window.
///
/// # Panics
///
/// Panics if any check fails.
pub fn assert_token_for(token: &SecretString, user_id: &str) {
    let claims = verify_test_token(token);
    let now = chrono::Utc::now().timestamp();

    assert_eq!(claims.user_id, user_id, "token issued to wrong user");
    assert_eq!(claims.validity_secs(), 24 * 3600 + 60, "unexpected validity window");
    assert!(claims.iat <= now, "iat must not be in the future");
}
