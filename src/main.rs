//! Crowd Grid Server - authoritative crowd-voted grid game
//!
//! This is the main entry point. It:
//! - Loads configuration from the environment
//! - Creates or resumes the single active game
//! - Drives the tick scheduler until shutdown

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crowd_grid_server::app::AppState;
use crowd_grid_server::config::{Config, LogFormat};
use crowd_grid_server::game::TickScheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level, config.log_format);

    info!("Starting Crowd Grid Server");
    info!(
        width = config.grid_width,
        height = config.grid_height,
        tick_ms = config.tick_interval.as_millis() as u64,
        vote_policy = ?config.vote_policy,
        "Game configuration"
    );

    // Create application state
    let state = AppState::new(config.clone())?;

    // Create or resume the game
    let game_id = state.engine.init().await?;

    // Spawn the tick scheduler
    let scheduler = TickScheduler::new(state.engine.clone(), game_id, config.tick_interval).spawn();

    shutdown_signal().await;

    scheduler.shutdown().await;

    let snapshot = state.engine.get_state(game_id, None).await?;
    info!(
        game_id = %game_id,
        score = snapshot.score,
        high_score = snapshot.high_score,
        "Server shutdown complete"
    );
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str, format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init(),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
