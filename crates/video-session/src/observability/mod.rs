//! Observability helpers for the video session layer.
//!
//! # Privacy by Default
//!
//! Secret-handling functions use `#[instrument(skip_all)]` and log an
//! explicit allow-list of fields. Fields fall into three groups:
//! - **SAFE**: Can be logged in plaintext (attempt counts, states, lengths)
//! - **HASHED**: Logged as a correlation hash (user id)
//! - **NEVER**: Must never appear in logs (API secret, tokens)

pub mod metrics;

use sha2::{Digest, Sha256};

/// Hash a field value for correlation in logs (SHA-256, first 8 hex chars)
///
/// Used for the user id, which needs correlation across log entries but
/// should not be stored in plaintext.
pub fn hash_for_correlation(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let result = hasher.finalize();
    // First 4 bytes: enough for correlation, limits reversibility
    hex::encode(result.get(..4).unwrap_or_default())
}
