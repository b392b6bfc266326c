//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. Use these types for
//! the video API secret and for every access token minted from it.
//!
//! `SecretString` prints as `[REDACTED]` under `Debug`, so structs holding
//! credentials can derive `Debug` and be traced without leaking them. The
//! inner value is zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::SecretString;
//! use secrecy::ExposeSecret;
//!
//! #[derive(Debug)]
//! struct Credentials {
//!     api_key: String,
//!     api_secret: SecretString,  // Safe: Debug shows "[REDACTED]"
//! }
//!
//! let creds = Credentials {
//!     api_key: "mmhfdzb5evj2".to_string(),
//!     api_secret: SecretString::from("hunter2"),
//! };
//!
//! // This is safe - the secret is redacted
//! println!("{:?}", creds);
//!
//! // To access the actual value, you must explicitly call expose_secret()
//! let secret: &str = creds.api_secret.expose_secret();
//! ```
//!
//! # Usage Guidelines
//!
//! Use `SecretString` for:
//! - The private API secret used to sign tokens
//! - Signed access tokens handed to video clients
//!
//! The public API key is not a secret and stays a plain `String`.

// Re-export the main types from secrecy
pub use secrecy::{ExposeSecret, SecretString};
