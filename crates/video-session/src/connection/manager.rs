//! Connection manager.
//!
//! Owns at most one live video client. `establish` builds a client for the
//! session's identity and connects it, retrying transient failures a fixed
//! number of times with a constant delay. The handle is published to
//! subscribers only once connected, and released on `teardown`, on
//! replacement by a different identity, or when the manager is dropped.
//!
//! # Cancellation
//!
//! Every attempt and every retry delay races the caller's
//! `CancellationToken`. A connect that is cancelled mid-flight is dropped
//! and its client disconnected, so a late success never publishes a handle.
//! A caller that drops `establish` instead gets the same cleanup from a drop
//! guard.

use super::state::ConnectionState;
use crate::client::{TokenProvider, VideoClient, VideoClientFactory};
use crate::config::{ClientOptions, Config, RetryPolicy};
use crate::errors::VideoError;
use crate::identity::{SessionContext, UserDescriptor};
use crate::observability::{hash_for_correlation, metrics};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

struct ActiveSession<C> {
    user_id: String,
    client: Arc<C>,
}

/// Resets the published state to `Idle` if `establish` is dropped before it
/// reaches `Connected`, `Failed` or `Cancelled`, and closes any client it
/// had started connecting.
struct EstablishGuard<C: VideoClient + 'static> {
    state_tx: Arc<watch::Sender<ConnectionState>>,
    client: Option<Arc<C>>,
    armed: bool,
}

impl<C: VideoClient + 'static> EstablishGuard<C> {
    fn new(state_tx: Arc<watch::Sender<ConnectionState>>) -> Self {
        Self {
            state_tx,
            client: None,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
        self.client = None;
    }
}

impl<C: VideoClient + 'static> Drop for EstablishGuard<C> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        warn!(
            target: "vs.connection.manager",
            "Connection establishment abandoned, resetting to idle"
        );
        self.state_tx.send_replace(ConnectionState::Idle);

        if let (Some(client), Ok(handle)) =
            (self.client.take(), tokio::runtime::Handle::try_current())
        {
            handle.spawn(async move {
                if let Err(e) = client.disconnect_user().await {
                    debug!(
                        target: "vs.connection.manager",
                        error = %e,
                        "Disconnect after abandoned establish failed"
                    );
                }
            });
        }
    }
}

/// Manages the lifecycle of a single video session.
pub struct ConnectionManager<F: VideoClientFactory> {
    factory: F,
    api_key: Option<String>,
    options: ClientOptions,
    retry: RetryPolicy,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    handle_tx: watch::Sender<Option<Arc<F::Client>>>,
    active: Option<ActiveSession<F::Client>>,
}

impl<F: VideoClientFactory> ConnectionManager<F> {
    #[must_use]
    pub fn new(
        factory: F,
        api_key: Option<String>,
        options: ClientOptions,
        retry: RetryPolicy,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        let (handle_tx, _) = watch::channel(None);

        Self {
            factory,
            api_key,
            options,
            retry,
            state_tx: Arc::new(state_tx),
            handle_tx,
            active: None,
        }
    }

    #[must_use]
    pub fn from_config(factory: F, config: &Config) -> Self {
        Self::new(
            factory,
            config.credentials.api_key.clone(),
            config.client.clone(),
            config.retry,
        )
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    /// Receive every state transition.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Receive the published handle; `None` unless connected.
    #[must_use]
    pub fn subscribe_handle(&self) -> watch::Receiver<Option<Arc<F::Client>>> {
        self.handle_tx.subscribe()
    }

    /// The live handle, if connected.
    #[must_use]
    pub fn handle(&self) -> Option<Arc<F::Client>> {
        self.active.as_ref().map(|a| Arc::clone(&a.client))
    }

    /// Bring the managed session in line with `ctx`.
    ///
    /// - Session still loading: nothing happens.
    /// - Signed out: any live session is torn down.
    /// - Signed in: delegates to [`Self::establish`], which reuses a session
    ///   for the same user and replaces one for a different user.
    ///
    /// # Errors
    ///
    /// Whatever [`Self::establish`] returns.
    pub async fn sync(
        &mut self,
        ctx: &SessionContext,
        token_provider: Arc<dyn TokenProvider>,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<F::Client>>, VideoError> {
        if !ctx.is_loaded {
            debug!(target: "vs.connection.manager", "Session not loaded yet, skipping");
            return Ok(None);
        }

        if ctx.identity.is_none() {
            debug!(target: "vs.connection.manager", "No signed-in user, releasing session");
            self.teardown().await;
            return Ok(None);
        }

        self.establish(ctx, token_provider, cancel).await.map(Some)
    }

    /// Connect the identity in `ctx`, retrying transient failures.
    ///
    /// Makes one initial attempt plus up to `max_retries` retries, each
    /// retry preceded by `retry_delay`. Dropping the future before it
    /// resolves, for example under `tokio::time::timeout`, resets the state
    /// to `Idle` and disconnects the half-built client.
    ///
    /// # Errors
    ///
    /// - `VideoError::Unauthenticated` - no loaded identity; state unchanged
    /// - `VideoError::Configuration` - API key missing or client build failed
    /// - `VideoError::ConnectFailed` - retries exhausted
    /// - `VideoError::Cancelled` - `cancel` fired; state returns to `Idle`
    /// - any other non-retryable error from the connect call
    #[instrument(skip_all)]
    pub async fn establish(
        &mut self,
        ctx: &SessionContext,
        token_provider: Arc<dyn TokenProvider>,
        cancel: &CancellationToken,
    ) -> Result<Arc<F::Client>, VideoError> {
        let identity = ctx
            .loaded_identity()
            .ok_or(VideoError::Unauthenticated)?
            .clone();

        if let Some(active) = &self.active {
            if active.user_id == identity.id {
                debug!(
                    target: "vs.connection.manager",
                    user = %hash_for_correlation(&identity.id),
                    "Session already established for user"
                );
                return Ok(Arc::clone(&active.client));
            }
        }

        // A different user (or none) holds the slot; release it first.
        self.teardown().await;

        let Some(api_key) = self.api_key.clone().filter(|k| !k.is_empty()) else {
            return Err(self.fail(VideoError::Configuration(
                "video API key is missing".to_string(),
            )));
        };

        let user = UserDescriptor::from(&identity);

        let mut guard = EstablishGuard::new(Arc::clone(&self.state_tx));
        self.set_state(ConnectionState::Connecting { attempt: 1 });

        let result = self
            .connect_with_retry(&api_key, &user, token_provider, cancel, &mut guard)
            .await;
        guard.disarm();
        result
    }

    async fn connect_with_retry(
        &mut self,
        api_key: &str,
        user: &UserDescriptor,
        token_provider: Arc<dyn TokenProvider>,
        cancel: &CancellationToken,
        guard: &mut EstablishGuard<F::Client>,
    ) -> Result<Arc<F::Client>, VideoError> {
        info!(
            target: "vs.connection.manager",
            user = %hash_for_correlation(&user.id),
            api_key = %api_key,
            base_url = %self.options.base_url,
            "Initializing video client"
        );

        let client = match self
            .factory
            .create(api_key, user, token_provider, &self.options)
        {
            Ok(client) => Arc::new(client),
            Err(e) => return Err(self.fail(e)),
        };
        guard.client = Some(Arc::clone(&client));

        let max_retries = self.retry.max_retries;
        let mut retries: u32 = 0;

        loop {
            let attempt = retries.saturating_add(1);
            self.set_state(ConnectionState::Connecting { attempt });

            info!(
                target: "vs.connection.manager",
                attempt = attempt,
                max_attempts = max_retries.saturating_add(1),
                "Attempting connection"
            );

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                result = client.connect_user(user) => Some(result),
            };

            let err = match outcome {
                None => {
                    // A connect request may already have reached the service.
                    if let Err(e) = client.disconnect_user().await {
                        debug!(
                            target: "vs.connection.manager",
                            error = %e,
                            "Disconnect after cancellation failed"
                        );
                    }
                    return Err(self.cancelled());
                }
                Some(Ok(())) => {
                    metrics::record_connect_attempt("success");
                    info!(
                        target: "vs.connection.manager",
                        attempt = attempt,
                        "Video client connected successfully"
                    );

                    self.active = Some(ActiveSession {
                        user_id: user.id.clone(),
                        client: Arc::clone(&client),
                    });
                    self.set_state(ConnectionState::Connected {
                        user_id: user.id.clone(),
                    });
                    self.handle_tx.send_replace(Some(Arc::clone(&client)));

                    return Ok(client);
                }
                Some(Err(e)) => e,
            };

            warn!(
                target: "vs.connection.manager",
                attempt = attempt,
                error = %err,
                "Connection attempt failed"
            );

            if !err.is_retryable() {
                metrics::record_connect_attempt("fatal");
                return Err(self.fail(err));
            }

            if retries >= max_retries {
                metrics::record_connect_attempt("exhausted");
                // With retries disabled the single attempt still counts.
                return Err(self.fail(VideoError::ConnectFailed {
                    attempts: max_retries.max(1),
                    message: err.to_string(),
                }));
            }

            metrics::record_connect_attempt("retry");
            info!(
                target: "vs.connection.manager",
                delay_ms = self.retry.retry_delay.as_millis(),
                "Retrying connection"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(self.cancelled()),
                () = tokio::time::sleep(self.retry.retry_delay) => {}
            }

            retries += 1;
        }
    }

    /// Disconnect and release the live session, if any, and return to `Idle`.
    ///
    /// Disconnect is issued at most once per session. A failing disconnect is
    /// logged and swallowed.
    #[instrument(skip_all)]
    pub async fn teardown(&mut self) {
        if let Some(active) = self.active.take() {
            self.handle_tx.send_replace(None);

            info!(
                target: "vs.connection.manager",
                user = %hash_for_correlation(&active.user_id),
                "Disconnecting video client"
            );

            if let Err(e) = active.client.disconnect_user().await {
                warn!(
                    target: "vs.connection.manager",
                    error = %e,
                    "Disconnect failed"
                );
            }
        }

        self.set_state(ConnectionState::Idle);
    }

    fn set_state(&self, state: ConnectionState) {
        debug!(
            target: "vs.connection.manager",
            state = state.as_str(),
            "Connection state changed"
        );
        self.state_tx.send_replace(state);
    }

    fn fail(&self, err: VideoError) -> VideoError {
        error!(
            target: "vs.connection.manager",
            error = %err,
            "Error initializing video client"
        );
        metrics::record_connection_failure(err.category());
        self.set_state(ConnectionState::Failed {
            message: err.to_string(),
        });
        err
    }

    fn cancelled(&self) -> VideoError {
        info!(target: "vs.connection.manager", "Connection establishment cancelled");
        self.set_state(ConnectionState::Idle);
        VideoError::Cancelled
    }
}

impl<F: VideoClientFactory> Drop for ConnectionManager<F> {
    fn drop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        // Async disconnect needs a runtime; without one the session is left
        // for the service to expire.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = active.client.disconnect_user().await {
                        warn!(
                            target: "vs.connection.manager",
                            error = %e,
                            "Disconnect on drop failed"
                        );
                    }
                });
            }
            Err(_) => {
                warn!(
                    target: "vs.connection.manager",
                    "Manager dropped outside a runtime, session not disconnected"
                );
            }
        }
    }
}
