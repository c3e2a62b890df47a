use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use queue_server::backend::domain::OutletService;
use queue_server::backend::io::DirectoryFile;
use queue_server::backend::storage::csv::CsvConnection;
use queue_server::backend::storage::sqlite::DbConnection;
use queue_server::backend::storage::Connection;
use queue_server::backend::{create_router, initialize_backend};
use queue_server::config::{AppConfig, StorageKind};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create data directory {}", config.data_dir.display()))?;

    match config.storage {
        StorageKind::Sqlite => {
            info!("Setting up database at {}", config.database_url);
            let connection = DbConnection::new(&config.database_url).await?;
            run(connection, &config).await
        }
        StorageKind::Csv => {
            info!("Setting up CSV storage in {}", config.data_dir.display());
            let connection = CsvConnection::new(&config.data_dir)?;
            run(connection, &config).await
        }
    }
}

async fn run<C: Connection>(connection: C, config: &AppConfig) -> Result<()> {
    let settings = config.settings();

    if config.outlets_file.exists() {
        let (outlets, service_types) = DirectoryFile::read(&config.outlets_file)?.into_domain()?;
        OutletService::new(&connection, &settings)
            .import(&outlets, &service_types)
            .await?;
    } else {
        warn!(
            "Outlet directory {} not found; serving the outlets already in storage",
            config.outlets_file.display()
        );
    }

    let app_state = initialize_backend(&connection, settings);
    let app = create_router(app_state, config.cors_origin.as_deref());

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down, closing {} storage", connection.backend_name());
    connection.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
