//! deferq agent - Main Entry Point
//! Queues HTTP requests read from stdin and replays them when the backend is reachable

mod config;
mod submission;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::AgentConfig;
use deferq_core::port::id_provider::UuidProvider;
use deferq_core::port::time_provider::SystemTimeProvider;
use deferq_core::OfflineQueue;
use deferq_infra_net::{HttpDelivery, TcpProbeConnectivity};
use deferq_infra_sqlite::{create_pool, run_migrations, SqliteStore};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    let log_format = std::env::var("DEFERQ_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("deferq=info"))?;

    match log_format.as_str() {
        "json" => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            // Development: Pretty formatting with colors
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }

    info!("deferq agent v{} starting...", VERSION);

    // 2. Load configuration
    let config = AgentConfig::from_env()?;
    info!(db_path = %config.db_path, delivery_url = %config.delivery_url, "Configuration loaded");

    // 3. Initialize storage
    if let Some(parent) = std::path::Path::new(&config.db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let pool = create_pool(&config.db_path)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 4. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let store = Arc::new(SqliteStore::new(pool, time_provider.clone()));
    let connectivity = Arc::new(
        TcpProbeConnectivity::spawn(
            config.probe_addr.clone(),
            config.probe_interval,
            config.probe_timeout,
        )
        .await,
    );
    let delivery = Arc::new(
        HttpDelivery::new(config.delivery_url.clone(), config.request_timeout)
            .map_err(|e| anyhow::anyhow!("Delivery setup failed: {}", e))?,
    );

    let queue = OfflineQueue::new(
        config.queue_config(),
        store,
        connectivity,
        delivery,
        Arc::new(UuidProvider),
        time_provider,
    )?;
    queue.on_permanent_failure(|op, err| {
        error!(
            op_id = %op.id,
            correlation_id = ?op.correlation_id,
            retry_count = op.retry_count,
            error = %err,
            "Operation dropped after exhausting retries"
        );
    });

    // 5. Restore persisted operations
    queue.initialize().await?;
    info!(queue_size = queue.size().await, "System ready. Reading submissions from stdin");

    // 6. Pump stdin until EOF or Ctrl+C
    let reader = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = submission::pump(reader, &queue) => match result {
            Ok(accepted) => info!(accepted = accepted, "Input closed"),
            Err(e) => error!(error = ?e, "Failed reading submissions"),
        },
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }

    // 7. Graceful shutdown
    queue.shutdown();
    if tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, queue.wait_idle())
        .await
        .is_err()
    {
        warn!("Drain still running at shutdown; remaining operations stay persisted");
    }

    let stats = queue.stats().await;
    info!(pending = stats.pending, parked = stats.parked, "Shutdown complete.");
    Ok(())
}
