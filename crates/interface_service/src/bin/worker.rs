//! Ledger scheduler worker
//!
//! Connects to PostgreSQL, applies migrations and materializes recurring
//! obligations on a fixed period until interrupted.
//!
//! # Usage
//!
//! ```bash
//! LEDGER_DATABASE_URL=postgres://... cargo run --bin ledger-worker
//! ```
//!
//! # Environment Variables
//!
//! * `LEDGER_DATABASE_URL` - PostgreSQL connection string
//! * `LEDGER_MAX_CONNECTIONS` - Pool size (default: 10)
//! * `LEDGER_LOG_LEVEL` - Filter used when `RUST_LOG` is unset (default: info)
//! * `LEDGER_CURRENCY` - Ledger currency (default: BDT)
//! * `LEDGER_TIMEZONE` - Shop calendar zone (default: Asia/Dhaka)
//! * `LEDGER_SCHEDULER_PERIOD_SECS` - Seconds between ticks (default: 3600)
//! * `LEDGER_RUN_ON_START` - Tick immediately on start (default: false)
//! * `LEDGER_GRACE_DAYS` - Days from due date to pay-by date (default: 7)
//! * `LEDGER_NOTIFICATION_TIMEOUT_MS` - Per-channel send timeout (default: 5000)

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use core_kernel::{AdapterHealth, SystemClock};
use interface_service::{LedgerService, ServiceConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = ServiceConfig::from_env()?;
    init_tracing(&config.log_level);

    info!(
        period_secs = config.scheduler_period_secs,
        run_on_start = config.run_on_start,
        "Starting ledger worker"
    );

    let service = LedgerService::connect(&config, Arc::new(SystemClock)).await?;
    for result in service.health().await {
        if result.status == AdapterHealth::Healthy {
            info!(adapter = %result.adapter_id, latency_ms = result.latency_ms, "Adapter healthy");
        } else {
            warn!(adapter = %result.adapter_id, message = ?result.message, "Adapter not healthy");
        }
    }

    let shutdown = CancellationToken::new();
    let worker = service.scheduler(shutdown.clone()).spawn();

    shutdown_signal().await;
    shutdown.cancel();

    let ticks = worker.await?;
    info!(ticks = ticks, "Ledger worker stopped");
    Ok(())
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping after the current tick");
}
