//! Video session layer.
//!
//! Mints short-lived access tokens for an authenticated user and manages a
//! retrying client session with the external video service.
//!
//! - [`token`] - token issuance from an explicit [`identity::SessionContext`]
//! - [`connection`] - bounded-retry session establishment and teardown
//! - [`client`] - the video client seam and its HTTP implementation
//! - [`config`] - environment configuration
//! - [`observability`] - correlation hashing and metrics

pub mod client;
pub mod config;
pub mod connection;
pub mod errors;
pub mod identity;
pub mod observability;
pub mod token;
