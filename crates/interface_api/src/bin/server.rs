//! Billing Ledger - API Server Binary
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin billing-api
//!
//! # Run with environment variables
//! API_PORT=8081 DATABASE_URL=postgres://... cargo run --bin billing-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` / `API_PORT` - Bind address (default: 0.0.0.0:8081)
//! * `API_DATABASE_URL` or `DATABASE_URL` - PostgreSQL connection string
//! * `API_APP_ENV` - `production` switches logs to JSON
//! * `API_LOG_LEVEL` - Initial log level; `RUST_LOG` takes precedence
//! * `API_PAGING_LIMIT_DEFAULT` / `API_PAGING_LIMIT_MAX` - Listing page sizes
//! * `API_PAYMENT_TIMEOUT_MS` - Whole-request budget for payment posting
//! * `API_DB_*` - Pool sizing and lifetimes

use std::net::SocketAddr;

use anyhow::Context;
use tokio::net::TcpListener;

use domain_billing::BillingLedger;
use infra_db::{create_pool, run_migrations, PostgresLedgerAdapter};
use interface_api::{config::ApiConfig, create_router, telemetry, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("failed to load configuration")?;
    let log_control = telemetry::init_tracing(&config).context("failed to install tracing subscriber")?;

    tracing::info!(
        host = %config.host,
        port = %config.port,
        app_env = %config.app_env,
        "Starting billing API server"
    );

    let pool = create_pool(config.database())
        .await
        .context("failed to connect to database")?;
    run_migrations(&pool).await.context("failed to run migrations")?;

    let ledger = BillingLedger::new(PostgresLedgerAdapter::new(pool));
    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .with_context(|| format!("invalid server address {}", config.server_addr()))?;

    let app = create_router(AppState::new(ledger, config).with_log_control(log_control));

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await.context("failed to bind listener")?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
