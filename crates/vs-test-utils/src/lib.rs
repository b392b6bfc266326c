//! # Video Session Test Utilities
//!
//! Shared test utilities for the video session layer.
//!
//! ## Modules
//!
//! - `mock_service` - Scripted mock video service (client factory + clients)
//! - `fixtures` - Identities, credentials, token providers and token checks
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vs_test_utils::*;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_example() {
//!     // Mock service whose first two connects fail
//!     let service = MockVideoService::builder()
//!         .fail_times(2, "connection refused")
//!         .build();
//!
//!     let mut manager = test_manager(service.clone());
//!     let client = manager
//!         .establish(&alice_session(), static_token_provider(), &CancellationToken::new())
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(service.connect_calls(), 3);
//! }
//! ```

pub mod fixtures;
pub mod mock_service;

// Re-export commonly used items
pub use fixtures::*;
pub use mock_service::*;
