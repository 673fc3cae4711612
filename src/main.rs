//! ERP Ledger - double-entry bookkeeping backend API
//!
//! Serves the chart of accounts, journal posting and financial reports over
//! HTTP. Balances are projected transactionally as entries are posted.

use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use erp_ledger::api::{self, SharedStore};
use erp_ledger::config::{LogFormat, StoreBackend};
use erp_ledger::{db, Config, InMemoryLedgerStore, PgLedgerStore};

/// Initialize tracing/logging
fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "erp_ledger=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Connect, optionally migrate, and verify the schema
async fn connect_postgres(config: &Config) -> anyhow::Result<PgPool> {
    let database_url = config
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for the postgres store"))?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(database_url)
        .await?;
    db::verify_connection(&pool).await?;

    if config.run_migrations {
        db::run_migrations(&pool).await?;
    }

    if !db::check_schema(&pool).await? {
        tracing::error!("Database schema is not complete. Please run migrations.");
        return Err(anyhow::anyhow!("Database schema incomplete"));
    }

    tracing::info!("Database connected successfully");
    Ok(pool)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!(
        environment = %config.environment,
        store = ?config.store_backend,
        "Starting erp_ledger server"
    );

    let (store, pool): (SharedStore, Option<PgPool>) = match config.store_backend {
        StoreBackend::Postgres => {
            let pool = connect_postgres(&config).await?;
            let store = PgLedgerStore::new(pool.clone()).with_max_retries(config.tx_max_retries);
            (Arc::new(store), Some(pool))
        }
        StoreBackend::Memory => {
            if config.is_production() {
                tracing::warn!("In-memory ledger store in production: data is lost on restart");
            }
            (Arc::new(InMemoryLedgerStore::new()), None)
        }
    };

    let app = api::build_router(store);

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutting down...");
    if let Some(pool) = pool {
        pool.close().await;
        tracing::info!("Database connections closed");
    }

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
