/*
 * Hermes - Cross-Chain Swap Routing Service
 * Main entry point for the application
 */

use hermes::{api, config::Config, service::SwapService};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting Hermes Cross-Chain Swap Service");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!("Configuration loaded successfully");

    let swap_service = Arc::new(SwapService::new(config.clone()).await?);

    spawn_background_jobs(swap_service.clone(), &config);

    let api_state = api::ApiState {
        swap_service,
    };

    info!(
        "Starting API server on {}:{}",
        config.server.host, config.server.port
    );

    let rocket = api::create_rocket(api_state);
    rocket.launch().await?;

    Ok(())
}

/// Periodic maintenance: the bridge-status sweep keeps in-flight
/// transactions moving, the daily sweep purges old records and resets
/// the bridge outflow counters.
fn spawn_background_jobs(service: Arc<SwapService>, config: &Config) {
    let pending_interval = Duration::from_secs(config.jobs.pending_check_secs);
    let cleanup_interval = Duration::from_secs(config.jobs.cleanup_interval_secs);

    let sweep_service = service.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(pending_interval);
        loop {
            interval.tick().await;
            sweep_service.check_pending_transactions().await;
        }
    });

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_interval);
        loop {
            interval.tick().await;
            service.cleanup_old_transactions().await;
            service.reset_daily_limits();
        }
    });
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hermes=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
