use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::any::AnyRow;
use sqlx::Row;

use crate::domain::entities::{BreakerState, BreakerStatus};
use crate::domain::errors::QueueResult;
use crate::domain::ports::BreakerStore;
use crate::infrastructure::persistence::Database;

/// SQL implementation of the BreakerStore
pub struct SqlBreakerStore {
    db: Database,
}

impl SqlBreakerStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BreakerStore for SqlBreakerStore {
    async fn load(&self, service: &str) -> QueueResult<Option<BreakerState>> {
        let row = sqlx::query(
            "SELECT service, state, failure_count, opened_at, last_failure
             FROM circuit_breakers
             WHERE service = ?",
        )
        .bind(service)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|r| state_from_row(&r)).transpose()
    }

    async fn save(&self, state: &BreakerState) -> QueueResult<()> {
        let now = Utc::now();
        let opened_at = state.opened_at.map(|at| at.to_rfc3339());

        // Portable upsert: UPDATE first, INSERT when the row is new.
        let result = sqlx::query(
            "UPDATE circuit_breakers
             SET state = ?, failure_count = ?, opened_at = ?, last_failure = ?, updated_at = ?
             WHERE service = ?",
        )
        .bind(state.status.to_string())
        .bind(state.failure_count)
        .bind(&opened_at)
        .bind(&state.last_failure)
        .bind(now.to_rfc3339())
        .bind(&state.service)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            sqlx::query(
                "INSERT INTO circuit_breakers (service, state, failure_count, opened_at, last_failure, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&state.service)
            .bind(state.status.to_string())
            .bind(state.failure_count)
            .bind(&opened_at)
            .bind(&state.last_failure)
            .bind(now.to_rfc3339())
            .execute(self.db.pool())
            .await?;
        }

        Ok(())
    }

    async fn list(&self) -> QueueResult<Vec<BreakerState>> {
        let rows = sqlx::query(
            "SELECT service, state, failure_count, opened_at, last_failure
             FROM circuit_breakers
             ORDER BY service ASC",
        )
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(state_from_row).collect()
    }
}

fn state_from_row(row: &AnyRow) -> QueueResult<BreakerState> {
    let status: String = row.try_get("state")?;
    let opened_at: Option<DateTime<Utc>> = match row.try_get::<String, _>("opened_at") {
        Ok(s) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        Err(_) => None, // NULL
    };
    let last_failure: Option<String> = row.try_get("last_failure").ok();

    Ok(BreakerState {
        service: row.try_get("service")?,
        status: BreakerStatus::from(status),
        failure_count: row.try_get("failure_count")?,
        opened_at,
        last_failure,
    })
}
