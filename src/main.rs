//! SocialSync binary entry point

use socialsync::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often abandoned OAuth attempts are swept
const STATE_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5 * 60);

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging
/// 3. Initialize AppState
/// 4. Start background tasks (OAuth state sweeper)
/// 5. Serve until ctrl-c
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration
    let config = config::AppConfig::load()?;

    // 2. Initialize tracing/logging
    let default_filter = format!("socialsync={},tower_http=debug", config.logging.level);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting SocialSync...");
    socialsync::metrics::init_metrics();

    // 3. Initialize application state
    let state = AppState::new(config.clone()).await?;
    let app = socialsync::build_router(state.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // 4. Start background tasks
    spawn_state_sweeper(state.clone());

    // 5. Serve
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Periodically drop OAuth attempts that never came back
fn spawn_state_sweeper(state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATE_SWEEP_INTERVAL);
        // The first tick fires immediately; nothing can be stale yet.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let removed = state.oauth.states().prune().await;
                    if removed > 0 {
                        tracing::info!(removed, "Swept expired OAuth states");
                    }
                }
            }
        }
    });

    tracing::info!("OAuth state sweeper spawned");
}

/// Resolves on ctrl-c and cancels every in-flight sync
async fn shutdown_signal(state: AppState) {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }

    tracing::info!("Shutdown requested");
    state.shutdown.cancel();
}
