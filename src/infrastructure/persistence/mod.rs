use log::LevelFilter;
use sqlx::{
    any::{AnyConnectOptions, AnyPoolOptions},
    AnyPool, ConnectOptions,
};
use std::str::FromStr;

mod breaker_store;
mod dlq_store;
mod job_store;

pub use breaker_store::SqlBreakerStore;
pub use dlq_store::SqlDlqStore;
pub use job_store::SqlJobStore;

pub struct Database {
    pub(crate) pool: AnyPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        // Ensure drivers are installed for AnyPool
        sqlx::any::install_default_drivers();

        let mut connect_options = AnyConnectOptions::from_str(database_url)?;

        // Configure logging
        connect_options = connect_options
            .log_statements(LevelFilter::Debug)
            .log_slow_statements(LevelFilter::Warn, std::time::Duration::from_secs(1));

        let pool = AnyPoolOptions::new()
            .max_connections(20)
            .min_connections(5)
            .connect_with(connect_options)
            .await?;

        // Enable optimizations for SQLite
        if database_url.starts_with("sqlite") {
            sqlx::query("PRAGMA journal_mode = WAL")
                .execute(&pool)
                .await?;
            sqlx::query("PRAGMA busy_timeout = 5000")
                .execute(&pool)
                .await?;
            sqlx::query("PRAGMA synchronous = NORMAL")
                .execute(&pool)
                .await?;
        }

        Ok(Self { pool })
    }

    /// Create the queue tables. A migrations framework is deliberately out of
    /// scope; the DDL is idempotent.
    pub async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL CHECK(status IN ('pending', 'running', 'completed', 'failed')),
                channel TEXT NOT NULL,
                payload TEXT NOT NULL,
                run_at TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                max_attempts INTEGER NOT NULL,
                error TEXT,
                idempotency_key TEXT NOT NULL,
                remote_id TEXT NOT NULL DEFAULT '',
                child_job_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_jobs_due ON jobs(status, run_at)",
        )
        .execute(&self.pool)
        .await
        .ok();

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_channel ON jobs(channel)")
            .execute(&self.pool)
            .await
            .ok();

        // Live jobs reserve their idempotency key; the lookup in enqueue is
        // the portable guard, this partial index backs it where the driver
        // supports one (sqlite, postgres).
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_idempotency_live
             ON jobs(channel, idempotency_key)
             WHERE status IN ('pending', 'running')",
        )
        .execute(&self.pool)
        .await
        .ok();

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS dlq_entries (
                id TEXT PRIMARY KEY,
                original_job_id TEXT NOT NULL,
                channel TEXT NOT NULL,
                payload TEXT NOT NULL,
                total_attempts INTEGER NOT NULL,
                final_error TEXT NOT NULL,
                moved_to_dlq_at TEXT NOT NULL,
                replayed_at TEXT
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_dlq_channel ON dlq_entries(channel)")
            .execute(&self.pool)
            .await
            .ok();

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_dlq_moved_at ON dlq_entries(moved_to_dlq_at)")
            .execute(&self.pool)
            .await
            .ok();

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS circuit_breakers (
                service TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                failure_count INTEGER NOT NULL DEFAULT 0,
                opened_at TEXT,
                last_failure TEXT,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}
