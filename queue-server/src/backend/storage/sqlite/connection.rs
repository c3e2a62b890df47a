use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use super::repositories::{LedgerRepository, OutletRepository};
use crate::backend::storage::traits::Connection;

const MAX_CONNECTIONS: u32 = 5;

/// DbConnection manages the SQLite pool shared by all repositories
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
}

impl DbConnection {
    /// Open (creating if needed) the database at a `sqlite:` URL
    pub async fn new(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid database URL {}", url))?;
        Self::connect(options).await
    }

    /// Open (creating if needed) the database file at `path`
    pub async fn open(path: &Path) -> Result<Self> {
        Self::connect(SqliteConnectOptions::new().filename(path)).await
    }

    async fn connect(options: SqliteConnectOptions) -> Result<Self> {
        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        Self::setup_schema(&pool).await?;
        info!("SQLite storage ready");

        Ok(Self { pool: Arc::new(pool) })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Set up the required database schema
    async fn setup_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS outlets (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                location TEXT NOT NULL,
                address TEXT NOT NULL,
                capacity INTEGER NOT NULL,
                service_types TEXT NOT NULL,
                operating_hours TEXT NOT NULL,
                is_active INTEGER NOT NULL,
                average_service_minutes INTEGER NOT NULL,
                minimum_wait_minutes INTEGER NOT NULL,
                priority_multipliers TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS service_types (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                category TEXT NOT NULL,
                estimated_minutes INTEGER NOT NULL,
                is_active INTEGER NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS customers (
                id TEXT PRIMARY KEY,
                outlet_id TEXT NOT NULL,
                service_day TEXT NOT NULL,
                token TEXT NOT NULL,
                token_sequence INTEGER NOT NULL,
                name TEXT NOT NULL,
                contact TEXT NOT NULL,
                email TEXT,
                service_type TEXT NOT NULL,
                priority TEXT NOT NULL,
                status TEXT NOT NULL,
                queue_position INTEGER,
                estimated_wait_secs INTEGER NOT NULL,
                actual_wait_secs INTEGER,
                registration_time TEXT NOT NULL,
                service_start_time TEXT,
                service_end_time TEXT,
                cancelled_time TEXT,
                assigned_officer_id TEXT,
                feedback_rating INTEGER,
                feedback_comment TEXT,
                feedback_submitted_at TEXT
            );
            "#,
        )
        .execute(pool)
        .await?;

        // One token per ledger
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_customers_token
            ON customers(outlet_id, service_day, token);
            "#,
        )
        .execute(pool)
        .await?;

        // One waiting entry per position
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_customers_waiting_position
            ON customers(outlet_id, service_day, queue_position)
            WHERE status = 'waiting';
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_customers_contact
            ON customers(outlet_id, service_day, contact);
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS queue_days (
                outlet_id TEXT NOT NULL,
                service_day TEXT NOT NULL,
                currently_serving TEXT,
                total_registered INTEGER NOT NULL,
                total_waiting INTEGER NOT NULL,
                total_served INTEGER NOT NULL,
                wait_time_total_secs INTEGER NOT NULL,
                wait_time_samples INTEGER NOT NULL,
                peak_hours TEXT NOT NULL,
                last_updated TEXT NOT NULL,
                PRIMARY KEY (outlet_id, service_day)
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Connection for DbConnection {
    type OutletRepository = OutletRepository;
    type LedgerRepository = LedgerRepository;

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn create_outlet_repository(&self) -> Self::OutletRepository {
        OutletRepository::new(self.clone())
    }

    fn create_ledger_repository(&self) -> Self::LedgerRepository {
        LedgerRepository::new(self.clone())
    }

    async fn close(&self) {
        info!("Closing SQLite pool");
        self.pool.close().await;
    }
}
