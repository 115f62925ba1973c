//! # jointsync
//!
//! Real-time joint-state synchronization server.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings (0.0.0.0:5000)
//! jointsync
//!
//! # Run with a config file at ./jointsync.toml (or /etc/jointsync/,
//! # ~/.config/jointsync/)
//! jointsync
//!
//! # Run with environment variables
//! JOINTSYNC_PORT=8080 JOINTSYNC_HOST=127.0.0.1 jointsync
//! ```

mod config;
mod handlers;
mod metrics;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jointsync=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!(
        "Starting jointsync server on {}:{}",
        config.host,
        config.port
    );

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    handlers::run_server(config).await?;

    Ok(())
}
