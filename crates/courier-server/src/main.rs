//! # Courier Server
//!
//! Standalone webhook delivery server: receives broker push deliveries over
//! HTTP and dispatches them through a [`courier_core::Bus`].
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! courier
//!
//! # Run with environment variables
//! COURIER_PORT=8080 COURIER_SECRET=s3cret COURIER_SUB_PREFIX=my-app courier
//! ```

mod config;
mod handlers;
mod metrics;

use anyhow::Result;
use courier_core::Bus;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting Courier server on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();

    // Build the dispatch bus. Embedding applications register their
    // handlers here before starting the server.
    let bus = Arc::new(Bus::in_memory(config.to_core()));

    // Start the server
    handlers::run_server(config, bus).await?;

    Ok(())
}
