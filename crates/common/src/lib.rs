//! Common utilities shared across video session components.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (token claims, lifetime constants, verification)
pub mod jwt;
