//! Mock video service for connection manager testing.
//!
//! A [`MockVideoService`] is both the `VideoClientFactory` handed to the
//! manager and the handle the test keeps to inspect what happened. Every
//! client it creates shares its state, so call counts span clients.
//!
//! Connect outcomes are scripted: queued behaviours are consumed one per
//! connect, then the default behaviour applies.
//!
//! # Example
//!
//! ```rust,ignore
//! use vs_test_utils::MockVideoService;
//!
//! let service = MockVideoService::builder()
//!     .fail_times(3, "refused")
//!     .failing_disconnect()
//!     .build();
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::time::Instant;
use video_session::client::{TokenProvider, VideoClient, VideoClientFactory};
use video_session::config::ClientOptions;
use video_session::errors::VideoError;
use video_session::identity::UserDescriptor;

/// What a single connect call does.
#[derive(Debug, Clone)]
pub enum ConnectBehavior {
    Succeed,
    Fail(VideoError),
}

#[derive(Debug)]
struct ServiceState {
    script: Mutex<VecDeque<ConnectBehavior>>,
    default: ConnectBehavior,
    fail_disconnect: bool,
    fetch_token: bool,
    gate: Option<Arc<Notify>>,
    connect_calls: AtomicU32,
    disconnect_calls: AtomicU32,
    connect_instants: Mutex<Vec<Instant>>,
    created_users: Mutex<Vec<UserDescriptor>>,
    created_api_keys: Mutex<Vec<String>>,
}

/// Mock video service; cheap to clone, clones share state.
#[derive(Debug, Clone)]
pub struct MockVideoService {
    state: Arc<ServiceState>,
}

impl MockVideoService {
    /// Create a new builder. Defaults: every connect succeeds.
    #[must_use]
    pub fn builder() -> MockVideoServiceBuilder {
        MockVideoServiceBuilder::default()
    }

    /// Every connect succeeds.
    #[must_use]
    pub fn accepting() -> Self {
        Self::builder().build()
    }

    /// Every connect fails with a retryable connection error.
    #[must_use]
    pub fn refusing(message: &str) -> Self {
        Self::builder().always_fail(message).build()
    }

    /// Number of connect calls across all clients.
    #[must_use]
    pub fn connect_calls(&self) -> u32 {
        self.state.connect_calls.load(Ordering::SeqCst)
    }

    /// Number of disconnect calls across all clients.
    #[must_use]
    pub fn disconnect_calls(&self) -> u32 {
        self.state.disconnect_calls.load(Ordering::SeqCst)
    }

    /// Tokio instants at which each connect call started.
    #[must_use]
    pub fn connect_instants(&self) -> Vec<Instant> {
        self.state.connect_instants.lock().unwrap().clone()
    }

    /// Users clients were created for, in creation order.
    #[must_use]
    pub fn created_users(&self) -> Vec<UserDescriptor> {
        self.state.created_users.lock().unwrap().clone()
    }

    /// API keys clients were created with, in creation order.
    #[must_use]
    pub fn created_api_keys(&self) -> Vec<String> {
        self.state.created_api_keys.lock().unwrap().clone()
    }

    /// Let one gated connect proceed. No-op unless built with `gated()`.
    pub fn release(&self) {
        if let Some(gate) = &self.state.gate {
            gate.notify_one();
        }
    }
}

impl VideoClientFactory for MockVideoService {
    type Client = MockVideoClient;

    fn create(
        &self,
        api_key: &str,
        user: &UserDescriptor,
        token_provider: Arc<dyn TokenProvider>,
        _options: &ClientOptions,
    ) -> Result<Self::Client, VideoError> {
        self.state.created_users.lock().unwrap().push(user.clone());
        self.state
            .created_api_keys
            .lock()
            .unwrap()
            .push(api_key.to_string());

        Ok(MockVideoClient {
            state: Arc::clone(&self.state),
            token_provider,
        })
    }
}

/// Client produced by [`MockVideoService`].
pub struct MockVideoClient {
    state: Arc<ServiceState>,
    token_provider: Arc<dyn TokenProvider>,
}

impl std::fmt::Debug for MockVideoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockVideoClient").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl VideoClient for MockVideoClient {
    async fn connect_user(&self, _user: &UserDescriptor) -> Result<(), VideoError> {
        self.state.connect_calls.fetch_add(1, Ordering::SeqCst);
        self.state
            .connect_instants
            .lock()
            .unwrap()
            .push(Instant::now());

        if self.state.fetch_token {
            self.token_provider.provide_token().await?;
        }

        if let Some(gate) = &self.state.gate {
            gate.notified().await;
        }

        let behavior = self
            .state
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.state.default.clone());

        match behavior {
            ConnectBehavior::Succeed => Ok(()),
            ConnectBehavior::Fail(e) => Err(e),
        }
    }

    async fn disconnect_user(&self) -> Result<(), VideoError> {
        self.state.disconnect_calls.fetch_add(1, Ordering::SeqCst);

        if self.state.fail_disconnect {
            Err(VideoError::Connection("mock disconnect failure".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Builder for [`MockVideoService`].
#[derive(Debug)]
pub struct MockVideoServiceBuilder {
    script: VecDeque<ConnectBehavior>,
    default: ConnectBehavior,
    fail_disconnect: bool,
    fetch_token: bool,
    gated: bool,
}

impl Default for MockVideoServiceBuilder {
    fn default() -> Self {
        Self {
            script: VecDeque::new(),
            default: ConnectBehavior::Succeed,
            fail_disconnect: false,
            fetch_token: false,
            gated: false,
        }
    }
}

impl MockVideoServiceBuilder {
    /// Fail the next `n` connects with a retryable connection error.
    #[must_use]
    pub fn fail_times(mut self, n: usize, message: &str) -> Self {
        for _ in 0..n {
            self.script.push_back(ConnectBehavior::Fail(VideoError::Connection(
                message.to_string(),
            )));
        }
        self
    }

    /// Queue an explicit behaviour for the next connect.
    #[must_use]
    pub fn then(mut self, behavior: ConnectBehavior) -> Self {
        self.script.push_back(behavior);
        self
    }

    /// Fail every connect not covered by the script.
    #[must_use]
    pub fn always_fail(mut self, message: &str) -> Self {
        self.default = ConnectBehavior::Fail(VideoError::Connection(message.to_string()));
        self
    }

    /// Make every disconnect return an error.
    #[must_use]
    pub fn failing_disconnect(mut self) -> Self {
        self.fail_disconnect = true;
        self
    }

    /// Ask the token provider for a token at the start of every connect,
    /// the way a real client does.
    #[must_use]
    pub fn fetching_tokens(mut self) -> Self {
        self.fetch_token = true;
        self
    }

    /// Block each connect until [`MockVideoService::release`] is called.
    #[must_use]
    pub fn gated(mut self) -> Self {
        self.gated = true;
        self
    }

    #[must_use]
    pub fn build(self) -> MockVideoService {
        MockVideoService {
            state: Arc::new(ServiceState {
                script: Mutex::new(self.script),
                default: self.default,
                fail_disconnect: self.fail_disconnect,
                fetch_token: self.fetch_token,
                gate: self.gated.then(|| Arc::new(Notify::new())),
                connect_calls: AtomicU32::new(0),
                disconnect_calls: AtomicU32::new(0),
                connect_instants: Mutex::new(Vec::new()),
                created_users: Mutex::new(Vec::new()),
                created_api_keys: Mutex::new(Vec::new()),
            }),
        }
    }
}
