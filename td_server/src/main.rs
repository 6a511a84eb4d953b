//! Tournament director server.
//!
//! Hosts the four services, their event consumers and the timer sweep, and
//! serves the HTTP API until Ctrl-C.

use anyhow::Error;
use log::info;
use pico_args::Arguments;
use td_server::{CliOverrides, ServerConfig, Services, api, logging, metrics};
use tokio::sync::watch;

const HELP: &str = "\
Run the tournament director

USAGE:
  td_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     HTTP bind address           [default: env SERVER_BIND or 127.0.0.1:3000]
  --db-url     URL         Postgres connection string  [default: env DATABASE_URL, in-memory when unset]
  --tick-ms    MS          Timer sweep period          [default: env TIMER_TICK_INTERVAL_MS or 1000]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              HTTP bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL             PostgreSQL connection string
  STORE_BACKEND            memory or postgres
  METRICS_BIND             Prometheus listener (e.g., 0.0.0.0:9090)
  RUST_LOG                 Log filter
  (See .env.example for all configuration options)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let overrides = CliOverrides {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        tick_ms: pargs.opt_value_from_str("--tick-ms")?,
    };

    logging::init();

    let config = ServerConfig::from_env(overrides)?;
    info!("Starting tournament director at {}", config.bind);

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(|e| anyhow::anyhow!(e))?;
        info!("Prometheus metrics at http://{}/metrics", addr);
    }

    let services = Services::connect(&config).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let background = services.spawn_background(shutdown_rx).await?;

    let app = api::create_router(services.app_state());

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", config.bind, e))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Shutting down background tasks...");
    let _ = shutdown_tx.send(true);
    for handle in background {
        if let Err(e) = handle.await {
            log::error!("Background task ended abnormally: {}", e);
        }
    }

    if let Some(database) = services.database {
        database.close().await;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
