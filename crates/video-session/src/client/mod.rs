//! Video service client seam.
//!
//! The connection manager only sees these traits. [`http::HttpVideoClient`]
//! is the production implementation; tests substitute scripted mocks.

pub mod http;

use crate::config::ClientOptions;
use crate::errors::VideoError;
use crate::identity::UserDescriptor;
use common::secret::SecretString;
use std::sync::Arc;

/// Callback a video client uses to obtain a fresh access token.
///
/// Invoked on every connect, so a token is never reused across sessions.
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    async fn provide_token(&self) -> Result<SecretString, VideoError>;
}

/// A client bound to one user, able to open and close a session.
#[async_trait::async_trait]
pub trait VideoClient: Send + Sync {
    /// Open a session for `user`.
    async fn connect_user(&self, user: &UserDescriptor) -> Result<(), VideoError>;

    /// Close the session, including one opened by a connect whose caller
    /// stopped waiting. Closing a client that never sent a connect is a no-op.
    async fn disconnect_user(&self) -> Result<(), VideoError>;
}

/// Builds video clients bound to a user and a token provider.
pub trait VideoClientFactory: Send + Sync {
    type Client: VideoClient + 'static;

    /// # Errors
    ///
    /// Returns `VideoError::Configuration` if the client cannot be built from
    /// the given key and options.
    fn create(
        &self,
        api_key: &str,
        user: &UserDescriptor,
        token_provider: Arc<dyn TokenProvider>,
        options: &ClientOptions,
    ) -> Result<Self::Client, VideoError>;
}
