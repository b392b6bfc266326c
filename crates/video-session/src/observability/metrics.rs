//! Metrics definitions for the video session layer.
//!
//! All metrics follow Prometheus naming conventions:
//! - `vs_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `status`: 2 values (success, error)
//! - `outcome`: 4 values (success, retry, exhausted, fatal)
//! - `reason`: bounded by `VideoError::category`

use metrics::{counter, histogram};
use std::time::Duration;

/// Record token issuance duration and outcome
///
/// Metric: `vs_token_issuance_duration_seconds`, `vs_token_issuance_total`
/// Labels: `status`
pub fn record_token_issuance(status: &str, duration: Duration) {
    histogram!("vs_token_issuance_duration_seconds", "status" => status.to_string())
        .record(duration.as_secs_f64());

    counter!("vs_token_issuance_total", "status" => status.to_string()).increment(1);
}

/// Record a single connect attempt
///
/// Metric: `vs_connect_attempts_total`
/// Labels: `outcome`
pub fn record_connect_attempt(outcome: &str) {
    counter!("vs_connect_attempts_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record a session establishment that ended in the failed state
///
/// Metric: `vs_connection_failures_total`
/// Labels: `reason`
pub fn record_connection_failure(reason: &str) {
    counter!("vs_connection_failures_total", "reason" => reason.to_string()).increment(1);
}
