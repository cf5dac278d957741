use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use arena_swarm::config::SwarmConfig;
use arena_swarm::metrics::Metrics;
use arena_swarm::net::operator::run_operator_server;
use arena_swarm::swarm::{ShutdownReason, Swarm};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Arena Swarm v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = SwarmConfig::load_or_default();
    config.validate()?;
    info!(
        "Configuration loaded: {}:{}, max_occupancy={}, ramp={}ms",
        config.bind_address,
        config.port,
        config.max_occupancy,
        config.ramp_interval.as_millis()
    );

    let metrics = Arc::new(Metrics::new());

    #[cfg(feature = "metrics")]
    {
        let metrics = metrics.clone();
        let port = config.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = arena_swarm::metrics::start_metrics_server(metrics, port).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    let addr = SocketAddr::new(config.bind_address, config.port);
    let swarm = Arc::new(Swarm::new(config, metrics));
    let mut shutdown = swarm.subscribe_shutdown();

    let operator = tokio::spawn(run_operator_server(swarm.clone(), addr));

    tokio::select! {
        result = operator => {
            match result {
                Ok(Err(e)) => error!("Operator link error: {}", e),
                Err(e) => error!("Operator link task failed: {}", e),
                Ok(Ok(())) => {}
            }
        }
        state = shutdown.wait_for(Option::is_some) => {
            match state.ok().and_then(|state| *state) {
                Some(ShutdownReason::StartupBlocked) => warn!("Startup failed: access blocked"),
                Some(reason) => info!("Shutdown complete ({:?})", reason),
                None => {}
            }
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
            info!("Shutdown signal received");
        }
    }

    info!("Swarm stopped");
    Ok(())
}
