//! REST implementation of [`VideoClient`].
//!
//! Every request carries the public API key as a query parameter and a
//! freshly provided JWT in the `Authorization` header, with
//! `stream-auth-type: jwt` selecting user-token authentication.
//!
//! # Security
//!
//! - Tokens are fetched per request and never logged
//! - User ids are logged as correlation hashes
//! - HTTP timeouts prevent hanging connections

use super::{TokenProvider, VideoClient, VideoClientFactory};
use crate::config::ClientOptions;
use crate::errors::VideoError;
use crate::identity::UserDescriptor;
use crate::observability::hash_for_correlation;
use common::secret::ExposeSecret;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Connect timeout for the underlying HTTP client.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Header selecting JWT user authentication.
const AUTH_TYPE_HEADER: &str = "stream-auth-type";

#[derive(Serialize)]
struct ConnectRequest<'a> {
    user_details: &'a UserDescriptor,
}

/// Call as returned by the video service.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CallInfo {
    /// Call id in `type:id` form.
    pub cid: String,
    #[serde(default)]
    pub created_by: Option<CallCreator>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CallCreator {
    pub id: String,
}

/// Response to get-or-create; `created` is false when the call already existed.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CallResponse {
    pub call: CallInfo,
    #[serde(default)]
    pub created: bool,
}

/// HTTP video client bound to a single user.
pub struct HttpVideoClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    user: UserDescriptor,
    token_provider: Arc<dyn TokenProvider>,
    connected: AtomicBool,
    /// A connect request left without a definitive answer; the service may
    /// hold a session for it.
    pending: AtomicBool,
}

impl std::fmt::Debug for HttpVideoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpVideoClient")
            .field("api_key", &self.api_key)
            .field("base_url", &self.base_url)
            .field("user", &hash_for_correlation(&self.user.id))
            .field("connected", &self.connected.load(Ordering::SeqCst))
            .field("pending", &self.pending.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl HttpVideoClient {
    /// Build a client for `user`.
    ///
    /// # Errors
    ///
    /// Returns `VideoError::Configuration` if the HTTP client cannot be built.
    pub fn new(
        api_key: &str,
        user: &UserDescriptor,
        token_provider: Arc<dyn TokenProvider>,
        options: &ClientOptions,
    ) -> Result<Self, VideoError> {
        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(options.timeout))
            .build()
            .map_err(|e| VideoError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        debug!(
            target: "vs.client.http",
            base_url = %options.base_url,
            log_level = %options.log_level,
            timeout_ms = options.timeout.as_millis(),
            user = %hash_for_correlation(&user.id),
            "Video client created"
        );

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            base_url: options.base_url.trim_end_matches('/').to_string(),
            user: user.clone(),
            token_provider,
            connected: AtomicBool::new(false),
            pending: AtomicBool::new(false),
        })
    }

    /// Whether a session is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Fetch or create the call `call_type/call_id`.
    ///
    /// # Errors
    ///
    /// Returns `VideoError::Call` on transport failure, non-2xx status or an
    /// unparseable body. Token provider errors are passed through.
    #[instrument(skip(self))]
    pub async fn get_or_create_call(
        &self,
        call_type: &str,
        call_id: &str,
    ) -> Result<CallResponse, VideoError> {
        let url = format!("{}/video/call/{call_type}/{call_id}", self.base_url);
        let headers = self.auth_headers().await?;

        let response = self
            .http
            .post(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .headers(headers)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| {
                warn!(target: "vs.client.http", error = %e, "Call request failed");
                VideoError::Call(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(target: "vs.client.http", status = %status, "Call request rejected");
            return Err(VideoError::Call(format!("Unexpected status: {status}")));
        }

        let call: CallResponse = response.json().await.map_err(|e| {
            warn!(target: "vs.client.http", error = %e, "Failed to parse call response");
            VideoError::Call(format!("Invalid call response: {e}"))
        })?;

        info!(
            target: "vs.client.http",
            cid = %call.call.cid,
            created = call.created,
            "Call ready"
        );

        Ok(call)
    }

    async fn auth_headers(&self) -> Result<HeaderMap, VideoError> {
        let token = self.token_provider.provide_token().await?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(token.expose_secret()).map_err(|_| {
                warn!(target: "vs.client.http", "Invalid token format");
                VideoError::Signing("Invalid token format".to_string())
            })?,
        );
        headers.insert(AUTH_TYPE_HEADER, HeaderValue::from_static("jwt"));
        Ok(headers)
    }
}

#[async_trait::async_trait]
impl VideoClient for HttpVideoClient {
    #[instrument(skip_all)]
    async fn connect_user(&self, user: &UserDescriptor) -> Result<(), VideoError> {
        let url = format!("{}/video/connect", self.base_url);
        let headers = self.auth_headers().await?;

        debug!(
            target: "vs.client.http",
            user = %hash_for_correlation(&user.id),
            "Connecting user"
        );

        // Cleared only once the service has answered, so a request dropped
        // or timed out mid-flight is still disconnected later.
        self.pending.store(true, Ordering::SeqCst);

        let response = self
            .http
            .post(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .headers(headers)
            .json(&ConnectRequest { user_details: user })
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    self.pending.store(false, Ordering::SeqCst);
                }
                debug!(target: "vs.client.http", error = %e, "HTTP request failed");
                VideoError::Connection(e.to_string())
            })?;

        let status = response.status();
        self.pending.store(false, Ordering::SeqCst);

        if status.is_success() {
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        } else if status.as_u16() == 401 || status.as_u16() == 403 {
            warn!(target: "vs.client.http", status = %status, "Video service rejected token");
            Err(VideoError::Connection(format!(
                "Authentication rejected: {status}"
            )))
        } else {
            warn!(target: "vs.client.http", status = %status, "Unexpected connect response");
            Err(VideoError::Connection(format!("Unexpected status: {status}")))
        }
    }

    #[instrument(skip_all)]
    async fn disconnect_user(&self) -> Result<(), VideoError> {
        let connected = self.connected.swap(false, Ordering::SeqCst);
        let pending = self.pending.swap(false, Ordering::SeqCst);
        if !connected && !pending {
            return Ok(());
        }

        let url = format!("{}/video/disconnect", self.base_url);
        let headers = self.auth_headers().await?;

        let response = self
            .http
            .post(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .headers(headers)
            .send()
            .await
            .map_err(|e| VideoError::Connection(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(VideoError::Connection(format!(
                "Disconnect failed: {status}"
            )))
        }
    }
}

/// Factory producing [`HttpVideoClient`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpVideoClientFactory;

impl VideoClientFactory for HttpVideoClientFactory {
    type Client = HttpVideoClient;

    fn create(
        &self,
        api_key: &str,
        user: &UserDescriptor,
        token_provider: Arc<dyn TokenProvider>,
        options: &ClientOptions,
    ) -> Result<Self::Client, VideoError> {
        HttpVideoClient::new(api_key, user, token_provider, options)
    }
}
