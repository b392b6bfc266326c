//! Video session error types.
//!
//! Token issuance and session establishment share one error type. Only
//! `Connection` and `Signing` are treated as transient; everything else ends
//! the retry loop on first sight. Messages never carry credential values.

use thiserror::Error;

/// Video session error type.
///
/// Retry classification:
/// - `Connection`, `Signing`: retried by the connection manager
/// - `Unauthenticated`, `Configuration`, `Call`: fatal
/// - `ConnectFailed`, `Cancelled`: terminal outcomes of `establish`
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VideoError {
    /// No signed-in user, or the session has not finished loading.
    #[error("User is not authenticated")]
    Unauthenticated,

    /// API key or secret missing, or client options unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport failure or rejected connect.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Retries exhausted. `attempts` counts retries (at least one), so the
    /// message reads the same as the bound that was exhausted.
    #[error("Failed to connect after {attempts} attempts: {message}")]
    ConnectFailed { attempts: u32, message: String },

    /// The signer rejected the claims.
    #[error("Token signing failed: {0}")]
    Signing(String),

    /// Establishment aborted through its cancellation token.
    #[error("Connection establishment cancelled")]
    Cancelled,

    /// Get-or-create call request failed.
    #[error("Call request failed: {0}")]
    Call(String),
}

impl VideoError {
    /// Whether a connect attempt that failed with this error may be retried.
    ///
    /// Missing identity and missing configuration cannot heal between
    /// attempts, so they end the retry loop immediately.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, VideoError::Connection(_) | VideoError::Signing(_))
    }

    /// Bounded label for metrics.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            VideoError::Unauthenticated => "unauthenticated",
            VideoError::Configuration(_) => "configuration",
            VideoError::Connection(_) | VideoError::ConnectFailed { .. } => "connection",
            VideoError::Signing(_) => "signing",
            VideoError::Cancelled => "cancelled",
            VideoError::Call(_) => "call",
        }
    }
}
