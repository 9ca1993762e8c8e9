//! MailRelay Server
//!
//! Accepts mail over HTTP and delivers it through the primary provider,
//! falling back to the secondary, or queues it when neither is reachable.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MR_CONFIG` | `mailrelay.toml` | Path to the TOML configuration |
//! | `MR_BIND_ADDR` | from config | HTTP listen address |
//! | `RUST_LOG` | `info` | Log level |
//!
//! Provider and database overrides are documented in `mr-config`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mr_config::{DatabaseConfig, RelayConfig};
use mr_dispatch::{
    Dispatcher, HistoryRepository, InMemoryMailStore, MailRecorder, MailSender, QueueRepository,
};

use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::SqlitePoolOptions;

#[derive(Parser, Debug)]
#[command(name = "mr-server")]
#[command(about = "MailRelay - failover email relay for SendGrid and MailGun")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, env = "MR_CONFIG", default_value = "mailrelay.toml")]
    config: String,

    /// HTTP listen address, overrides the configuration file
    #[arg(long, env = "MR_BIND_ADDR")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .init();

    let args = Args::parse();
    info!("Starting MailRelay server");

    let config = RelayConfig::load(&args.config)?;
    let bind_addr = args.bind.unwrap_or_else(|| config.server.bind_addr.clone());

    let metrics_handle = PrometheusBuilder::new().install_recorder()?;

    // Setup shutdown signal
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let (history, queue) = create_mail_store(&config.database).await?;
    info!("Mail store initialized ({})", config.database.db_type);

    let dispatcher = Dispatcher::new(&config, MailRecorder::new(history, queue))?;
    let sender: Arc<dyn MailSender> = Arc::new(dispatcher);
    info!(
        primary = %config.primary.name,
        secondary = %config.secondary.name,
        "Dispatcher ready"
    );

    let app = mr_api::create_router(sender).merge(metrics_router(metrics_handle));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("MailRelay listening on http://{}", bind_addr);

    let server_handle = {
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
                .ok();
        })
    };

    info!("Press Ctrl+C to shutdown");

    // Wait for shutdown
    shutdown_signal().await;
    info!("Shutdown signal received...");

    let _ = shutdown_tx.send(());

    let _ = tokio::time::timeout(Duration::from_secs(30), async {
        let _ = server_handle.await;
    }).await;

    info!("MailRelay server shutdown complete");
    Ok(())
}

async fn create_mail_store(
    database: &DatabaseConfig,
) -> Result<(Arc<dyn HistoryRepository>, Arc<dyn QueueRepository>)> {
    let url = || {
        database
            .url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("database url is required for {}", database.db_type))
    };

    match database.db_type.as_str() {
        "memory" => {
            let store = Arc::new(InMemoryMailStore::new());
            info!("Using in-memory mail store");
            Ok(split_store(store))
        }
        "sqlite" => {
            let url = url()?;
            let pool = sqlite_pool_options(&url, database.max_connections)
                .connect(&url)
                .await?;
            let store = Arc::new(mr_dispatch::sqlite::SqliteMailStore::new(pool));
            store.init_schema().await?;
            info!("Using SQLite mail store: {}", url);
            Ok(split_store(store))
        }
        "postgres" => {
            let url = url()?;
            let pool = PgPoolOptions::new()
                .max_connections(database.max_connections)
                .connect(&url)
                .await?;
            let store = Arc::new(mr_dispatch::postgres::PostgresMailStore::new(pool));
            store.init_schema().await?;
            info!("Using PostgreSQL mail store");
            Ok(split_store(store))
        }
        other => {
            Err(anyhow::anyhow!("Unknown database type: {}. Use memory, sqlite, or postgres", other))
        }
    }
}

/// An in-memory SQLite database lives only while a connection holds it open
fn sqlite_pool_options(url: &str, max_connections: u32) -> SqlitePoolOptions {
    let options = SqlitePoolOptions::new().max_connections(max_connections);
    if url.contains(":memory:") || url.contains("mode=memory") {
        options.min_connections(1).idle_timeout(None).max_lifetime(None)
    } else {
        options
    }
}

fn split_store<S>(store: Arc<S>) -> (Arc<dyn HistoryRepository>, Arc<dyn QueueRepository>)
where
    S: HistoryRepository + QueueRepository + 'static,
{
    let history: Arc<dyn HistoryRepository> = store.clone();
    let queue: Arc<dyn QueueRepository> = store;
    (history, queue)
}

fn metrics_router(handle: PrometheusHandle) -> axum::Router {
    axum::Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_sqlite_pool_keeps_a_connection() {
        let options = sqlite_pool_options("sqlite::memory:", 5);
        assert_eq!(options.get_min_connections(), 1);
        assert_eq!(options.get_idle_timeout(), None);
        assert_eq!(options.get_max_lifetime(), None);

        let options = sqlite_pool_options("sqlite://file:relay?mode=memory&cache=shared", 5);
        assert_eq!(options.get_min_connections(), 1);
    }

    #[test]
    fn test_file_sqlite_pool_uses_defaults() {
        let options = sqlite_pool_options("sqlite://mailrelay.db?mode=rwc", 5);
        assert_eq!(options.get_max_connections(), 5);
        assert_eq!(options.get_min_connections(), 0);
        assert!(options.get_idle_timeout().is_some());
    }

    #[tokio::test]
    async fn test_default_database_uses_memory_store() {
        assert!(create_mail_store(&DatabaseConfig::default()).await.is_ok());
    }
}
