//! Connection manager behaviour against a scripted mock video service.
//!
//! Retry timing tests run with a paused tokio clock, so the 2 s delays
//! auto-advance and the observed gaps are exact.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use video_session::config::{ClientOptions, RetryPolicy};
use video_session::connection::{ConnectionManager, ConnectionState};
use video_session::errors::VideoError;
use video_session::identity::SessionContext;
use video_session::token::{SessionTokenProvider, TokenIssuer};
use vs_test_utils::*;

// ============================================================================
// Establishment
// ============================================================================

#[tokio::test]
async fn test_first_attempt_success() {
    let service = MockVideoService::accepting();
    let mut manager = test_manager(service.clone());

    let client = manager
        .establish(
            &alice_session(),
            static_token_provider(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(service.connect_calls(), 1);
    assert_eq!(
        manager.state(),
        ConnectionState::Connected {
            user_id: "user_alice".to_string()
        }
    );
    assert!(Arc::ptr_eq(&manager.handle().unwrap(), &client));
    assert!(manager.subscribe_handle().borrow().is_some());
}

#[tokio::test]
async fn test_client_bound_to_identity_and_key() {
    let service = MockVideoService::accepting();
    let mut manager = test_manager(service.clone());

    manager
        .establish(
            &alice_session(),
            static_token_provider(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let users = service.created_users();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, "user_alice");
    assert_eq!(users[0].name, "alice");
    assert_eq!(
        users[0].image.as_deref(),
        Some("https://img.example.com/alice.png")
    );
    assert_eq!(service.created_api_keys(), vec![TEST_API_KEY.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_retries_exhausted_after_three_retries() {
    let service = MockVideoService::refusing("connection refused");
    let mut manager = test_manager(service.clone());
    let start = Instant::now();

    let err = manager
        .establish(
            &alice_session(),
            static_token_provider(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    // One initial attempt plus three retries
    assert_eq!(service.connect_calls(), 4);
    assert!(err
        .to_string()
        .contains("Failed to connect after 3 attempts"));
    assert!(err.to_string().contains("connection refused"));
    assert!(matches!(err, VideoError::ConnectFailed { attempts: 3, .. }));

    // Three fixed 2 s delays, nothing exponential
    assert_eq!(start.elapsed(), Duration::from_secs(6));
    let instants = service.connect_instants();
    for pair in instants.windows(2) {
        assert_eq!(pair[1] - pair[0], Duration::from_secs(2));
    }

    assert!(matches!(
        manager.state(),
        ConnectionState::Failed { message } if message.contains("Failed to connect after 3 attempts")
    ));
    assert!(manager.handle().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_success_after_transient_failures() {
    let service = MockVideoService::builder().fail_times(2, "timeout").build();
    let mut manager = test_manager(service.clone());
    let start = Instant::now();

    manager
        .establish(
            &alice_session(),
            static_token_provider(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(service.connect_calls(), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(4));
    assert!(manager.state().is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_success_on_last_retry() {
    let service = MockVideoService::builder().fail_times(3, "timeout").build();
    let mut manager = test_manager(service.clone());

    let result = manager
        .establish(
            &alice_session(),
            static_token_provider(),
            &CancellationToken::new(),
        )
        .await;

    assert!(result.is_ok());
    assert_eq!(service.connect_calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_state_transitions_observed_in_order() {
    let service = MockVideoService::builder().fail_times(1, "timeout").build();
    let mut manager = test_manager(service.clone());
    let mut state_rx = manager.subscribe_state();

    let observer = tokio::spawn(async move {
        let mut seen = vec![state_rx.borrow_and_update().clone()];
        while state_rx.changed().await.is_ok() {
            let state = state_rx.borrow_and_update().clone();
            let done = state.is_connected();
            seen.push(state);
            if done {
                break;
            }
        }
        seen
    });

    manager
        .establish(
            &alice_session(),
            static_token_provider(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    // The observer first runs during the retry delay; the watch channel
    // only guarantees the latest value, so intermediate states may coalesce.
    let seen = observer.await.unwrap();
    assert_eq!(seen.first(), Some(&ConnectionState::Connecting { attempt: 1 }));
    assert_eq!(
        seen.last(),
        Some(&ConnectionState::Connected {
            user_id: "user_alice".to_string()
        })
    );
}

#[tokio::test]
async fn test_non_retryable_error_fails_immediately() {
    let service = MockVideoService::builder()
        .then(ConnectBehavior::Fail(VideoError::Configuration(
            "bad options".to_string(),
        )))
        .build();
    let mut manager = test_manager(service.clone());

    let err = manager
        .establish(
            &alice_session(),
            static_token_provider(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err, VideoError::Configuration("bad options".to_string()));
    assert_eq!(service.connect_calls(), 1);
    assert!(matches!(manager.state(), ConnectionState::Failed { .. }));
}

#[tokio::test]
async fn test_unauthenticated_token_provider_is_not_retried() {
    let service = MockVideoService::builder().fetching_tokens().build();
    let mut manager = test_manager(service.clone());

    // Manager sees alice, but the issuer's context has nobody signed in
    let provider = Arc::new(SessionTokenProvider::new(
        Arc::new(TokenIssuer::new(test_credentials())),
        SessionContext::anonymous(),
    ));

    let err = manager
        .establish(&alice_session(), provider, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err, VideoError::Unauthenticated);
    assert_eq!(service.connect_calls(), 1);
}

#[tokio::test]
async fn test_connect_uses_issued_token() {
    let service = MockVideoService::builder().fetching_tokens().build();
    let mut manager = test_manager(service.clone());

    let provider = Arc::new(SessionTokenProvider::new(
        Arc::new(TokenIssuer::new(test_credentials())),
        alice_session(),
    ));

    manager
        .establish(&alice_session(), provider, &CancellationToken::new())
        .await
        .unwrap();

    assert!(manager.state().is_connected());
}

#[tokio::test]
async fn test_missing_api_key_creates_no_client() {
    let service = MockVideoService::accepting();
    let mut manager = ConnectionManager::new(
        service.clone(),
        None,
        ClientOptions::default(),
        RetryPolicy::default(),
    );

    let err = manager
        .establish(
            &alice_session(),
            static_token_provider(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, VideoError::Configuration(msg) if msg.contains("API key")));
    assert!(service.created_users().is_empty());
    assert_eq!(service.connect_calls(), 0);
}

#[tokio::test]
async fn test_establish_requires_loaded_identity() {
    let service = MockVideoService::accepting();
    let mut manager = test_manager(service.clone());

    let err = manager
        .establish(
            &SessionContext::loading(),
            static_token_provider(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err, VideoError::Unauthenticated);
    assert_eq!(manager.state(), ConnectionState::Idle);
    assert_eq!(service.connect_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_zero_retries_reports_single_attempt() {
    let service = MockVideoService::refusing("down");
    let mut manager = ConnectionManager::new(
        service.clone(),
        Some(TEST_API_KEY.to_string()),
        ClientOptions::default(),
        RetryPolicy {
            max_retries: 0,
            retry_delay: Duration::from_secs(2),
        },
    );

    let err = manager
        .establish(
            &alice_session(),
            static_token_provider(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(service.connect_calls(), 1);
    assert!(matches!(err, VideoError::ConnectFailed { attempts: 1, .. }));
    assert!(err.to_string().starts_with("Failed to connect after 1 attempts"));
}

// ============================================================================
// Handle publication
// ============================================================================

#[tokio::test]
async fn test_no_handle_published_while_connecting() {
    let service = MockVideoService::builder().gated().build();
    let mut manager = test_manager(service.clone());
    let mut state_rx = manager.subscribe_state();
    let handle_rx = manager.subscribe_handle();

    let task = tokio::spawn(async move {
        let result = manager
            .establish(
                &alice_session(),
                static_token_provider(),
                &CancellationToken::new(),
            )
            .await;
        (manager, result)
    });

    state_rx
        .wait_for(|s| matches!(s, ConnectionState::Connecting { .. }))
        .await
        .unwrap();
    assert!(handle_rx.borrow().is_none());

    service.release();
    let (_manager, result) = task.await.unwrap();

    assert!(result.is_ok());
    assert!(handle_rx.borrow().is_some());
}

// ============================================================================
// Teardown
// ============================================================================

#[tokio::test]
async fn test_teardown_disconnects_exactly_once() {
    let service = MockVideoService::accepting();
    let mut manager = test_manager(service.clone());
    let handle_rx = manager.subscribe_handle();

    manager
        .establish(
            &alice_session(),
            static_token_provider(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    manager.teardown().await;
    manager.teardown().await;

    assert_eq!(service.disconnect_calls(), 1);
    assert_eq!(manager.state(), ConnectionState::Idle);
    assert!(manager.handle().is_none());
    assert!(handle_rx.borrow().is_none());
}

#[tokio::test]
async fn test_teardown_swallows_disconnect_failure() {
    let service = MockVideoService::builder().failing_disconnect().build();
    let mut manager = test_manager(service.clone());

    manager
        .establish(
            &alice_session(),
            static_token_provider(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    manager.teardown().await;

    assert_eq!(service.disconnect_calls(), 1);
    assert_eq!(manager.state(), ConnectionState::Idle);
}

#[tokio::test]
async fn test_teardown_without_session_is_noop() {
    let service = MockVideoService::accepting();
    let mut manager = test_manager(service.clone());

    manager.teardown().await;

    assert_eq!(service.disconnect_calls(), 0);
    assert_eq!(manager.state(), ConnectionState::Idle);
}

#[tokio::test]
async fn test_drop_releases_session() {
    let service = MockVideoService::accepting();
    let mut manager = test_manager(service.clone());

    manager
        .establish(
            &alice_session(),
            static_token_provider(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    drop(manager);
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    assert_eq!(service.disconnect_calls(), 1);
}

// ============================================================================
// Identity changes
// ============================================================================

#[tokio::test]
async fn test_sync_same_identity_does_not_reconnect() {
    let service = MockVideoService::accepting();
    let mut manager = test_manager(service.clone());
    let cancel = CancellationToken::new();

    let first = manager
        .sync(&alice_session(), static_token_provider(), &cancel)
        .await
        .unwrap()
        .unwrap();
    let second = manager
        .sync(&alice_session(), static_token_provider(), &cancel)
        .await
        .unwrap()
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(service.connect_calls(), 1);
    assert_eq!(service.disconnect_calls(), 0);
}

#[tokio::test]
async fn test_sync_new_identity_replaces_session() {
    let service = MockVideoService::accepting();
    let mut manager = test_manager(service.clone());
    let cancel = CancellationToken::new();

    manager
        .sync(&alice_session(), static_token_provider(), &cancel)
        .await
        .unwrap();
    manager
        .sync(&bob_session(), static_token_provider(), &cancel)
        .await
        .unwrap();

    assert_eq!(service.connect_calls(), 2);
    assert_eq!(service.disconnect_calls(), 1);

    let users: Vec<String> = service.created_users().into_iter().map(|u| u.id).collect();
    assert_eq!(users, vec!["user_alice", "user_bob"]);
    assert_eq!(
        manager.state(),
        ConnectionState::Connected {
            user_id: "user_bob".to_string()
        }
    );
}

#[tokio::test]
async fn test_sync_sign_out_tears_down() {
    let service = MockVideoService::accepting();
    let mut manager = test_manager(service.clone());
    let cancel = CancellationToken::new();

    manager
        .sync(&alice_session(), static_token_provider(), &cancel)
        .await
        .unwrap();
    let result = manager
        .sync(
            &SessionContext::anonymous(),
            static_token_provider(),
            &cancel,
        )
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(service.disconnect_calls(), 1);
    assert_eq!(manager.state(), ConnectionState::Idle);
}

#[tokio::test]
async fn test_sync_while_loading_keeps_session() {
    let service = MockVideoService::accepting();
    let mut manager = test_manager(service.clone());
    let cancel = CancellationToken::new();

    manager
        .sync(&alice_session(), static_token_provider(), &cancel)
        .await
        .unwrap();
    let result = manager
        .sync(&SessionContext::loading(), static_token_provider(), &cancel)
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(service.disconnect_calls(), 0);
    assert!(manager.state().is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_reestablish_after_failure() {
    let service = MockVideoService::builder()
        .fail_times(4, "down")
        .build();
    let mut manager = test_manager(service.clone());
    let cancel = CancellationToken::new();

    let first = manager
        .establish(&alice_session(), static_token_provider(), &cancel)
        .await;
    assert!(first.is_err());

    let second = manager
        .establish(&alice_session(), static_token_provider(), &cancel)
        .await;
    assert!(second.is_ok());
    assert_eq!(service.connect_calls(), 5);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_cancel_during_retry_delay() {
    let service = MockVideoService::refusing("down");
    let mut manager = test_manager(service.clone());
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let err = manager
        .establish(&alice_session(), static_token_provider(), &cancel)
        .await
        .unwrap_err();

    assert_eq!(err, VideoError::Cancelled);
    assert_eq!(service.connect_calls(), 1);
    assert_eq!(manager.state(), ConnectionState::Idle);
    assert!(manager.handle().is_none());
}

#[tokio::test]
async fn test_cancel_mid_connect_discards_late_session() {
    let service = MockVideoService::builder().gated().build();
    let mut manager = test_manager(service.clone());
    let handle_rx = manager.subscribe_handle();
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    let watcher = service.clone();
    tokio::spawn(async move {
        while watcher.connect_calls() == 0 {
            tokio::task::yield_now().await;
        }
        canceller.cancel();
        // A late success must not be published
        watcher.release();
    });

    let err = manager
        .establish(&alice_session(), static_token_provider(), &cancel)
        .await
        .unwrap_err();

    assert_eq!(err, VideoError::Cancelled);
    assert_eq!(service.disconnect_calls(), 1);
    assert!(handle_rx.borrow().is_none());
    assert_eq!(manager.state(), ConnectionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_establish_resets_to_idle() {
    let service = MockVideoService::refusing("down");
    let mut manager = test_manager(service.clone());
    let state_rx = manager.subscribe_state();

    // Times out during the first 2 s retry delay
    let result = tokio::time::timeout(
        Duration::from_secs(1),
        manager.establish(
            &alice_session(),
            static_token_provider(),
            &CancellationToken::new(),
        ),
    )
    .await;
    assert!(result.is_err());

    assert_eq!(manager.state(), ConnectionState::Idle);
    assert_eq!(*state_rx.borrow(), ConnectionState::Idle);
    assert!(manager.handle().is_none());
    assert_eq!(service.connect_calls(), 1);

    // The half-built client is closed in the background
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(service.disconnect_calls(), 1);
}

#[tokio::test]
async fn test_dropped_establish_mid_connect_publishes_nothing() {
    let service = MockVideoService::builder().gated().build();
    let mut manager = test_manager(service.clone());
    let handle_rx = manager.subscribe_handle();

    {
        let session = alice_session();
        let cancel = CancellationToken::new();
        let establish = manager.establish(
            &session,
            static_token_provider(),
            &cancel,
        );
        tokio::pin!(establish);

        // Drive it until the connect call is parked on the gate
        tokio::select! {
            _ = &mut establish => panic!("gated connect must not complete"),
            () = async {
                while service.connect_calls() == 0 {
                    tokio::task::yield_now().await;
                }
            } => {}
        }
    }

    service.release();
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    assert_eq!(manager.state(), ConnectionState::Idle);
    assert!(handle_rx.borrow().is_none());
    assert_eq!(service.disconnect_calls(), 1);

    // The manager is usable again afterwards
    manager
        .establish(
            &alice_session(),
            static_token_provider(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
}
