use std::sync::Arc;

use crosspost::application::services::{
    BreakerConfig, CircuitBreakerRegistry, RetryPolicy,
};
use crosspost::domain::ports::{BreakerStore, Clock, DlqStore, JobStore};
use crosspost::infrastructure::persistence::{
    Database, SqlBreakerStore, SqlDlqStore, SqlJobStore,
};
use crosspost::infrastructure::runtime::SystemClock;
use uuid::Uuid;

pub async fn setup_test_db() -> Database {
    // Install drivers for AnyPool (required for tests)
    sqlx::any::install_default_drivers();

    // Use file-based SQLite for tests (unique UUID per test for parallel execution)
    let temp_file = format!("test_{}.db", Uuid::new_v4());
    let db_url = format!("sqlite://{}?mode=rwc", temp_file);

    let db = Database::connect(&db_url)
        .await
        .expect("Failed to connect to test database");

    db.init_schema().await.expect("Failed to apply schema");

    db
}

/// Deterministic backoff for assertions on run_at.
pub fn test_policy(max_attempts: i32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay_secs: 30,
        max_delay_secs: 3600,
        jitter: 0.0,
    }
}

pub fn build_stores(db: &Database, max_attempts: i32) -> (Arc<dyn JobStore>, Arc<dyn DlqStore>) {
    let dlq: Arc<dyn DlqStore> = Arc::new(SqlDlqStore::new(db.clone()));
    let jobs: Arc<dyn JobStore> = Arc::new(SqlJobStore::new(
        db.clone(),
        test_policy(max_attempts),
        dlq.clone(),
    ));
    (jobs, dlq)
}

pub fn build_registry(db: &Database, threshold: i32, cooldown_secs: i64) -> Arc<CircuitBreakerRegistry> {
    let store: Arc<dyn BreakerStore> = Arc::new(SqlBreakerStore::new(db.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    Arc::new(CircuitBreakerRegistry::new(
        BreakerConfig {
            threshold,
            cooldown_secs,
        },
        clock,
        store,
    ))
}
