use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use video_session::client::http::HttpVideoClientFactory;
use video_session::config::Config;
use video_session::connection::ConnectionManager;
use video_session::errors::VideoError;
use video_session::identity::{Identity, SessionContext};
use video_session::token::{SessionTokenProvider, TokenIssuer};

/// Call created once connected, to confirm the session is usable.
const TEST_CALL_TYPE: &str = "default";
const TEST_CALL_ID: &str = "test-call";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "video_session=debug,common=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting video session");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    let vars: HashMap<String, String> = std::env::vars().collect();
    let ctx = match Identity::from_vars(&vars) {
        Some(identity) => SessionContext::authenticated(identity),
        None => SessionContext::anonymous(),
    };

    let issuer = Arc::new(TokenIssuer::new(config.credentials.clone()));
    let token_provider = Arc::new(SessionTokenProvider::new(Arc::clone(&issuer), ctx.clone()));

    let mut manager = ConnectionManager::from_config(HttpVideoClientFactory, &config);
    let cancel = CancellationToken::new();

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            shutdown.cancel();
        }
    });

    let client = match manager.sync(&ctx, token_provider, &cancel).await {
        Ok(Some(client)) => client,
        Ok(None) => {
            warn!("No signed-in user; set VIDEO_USER_ID to connect");
            return Ok(());
        }
        Err(VideoError::Cancelled) => {
            info!("Shutdown before session was established");
            return Ok(());
        }
        Err(e) => {
            error!("Error: {}", e);
            return Err(e.into());
        }
    };

    match client.get_or_create_call(TEST_CALL_TYPE, TEST_CALL_ID).await {
        Ok(call) => info!(cid = %call.call.cid, "Test call created successfully"),
        Err(e) => error!("Error creating test call: {}", e),
    }

    info!("Session established, press Ctrl-C to disconnect");
    cancel.cancelled().await;

    manager.teardown().await;
    info!("Video session stopped");

    Ok(())
}
