use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::any::AnyRow;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::entities::{DlqEntry, DlqStats, Job, Page};
use crate::domain::errors::QueueResult;
use crate::domain::ports::DlqStore;
use crate::infrastructure::persistence::job_store::parse_date_col;
use crate::infrastructure::persistence::Database;

const DLQ_COLUMNS: &str = "id, original_job_id, channel, payload, total_attempts, final_error, \
                           moved_to_dlq_at, replayed_at";

/// SQL implementation of the DlqStore
pub struct SqlDlqStore {
    db: Database,
}

impl SqlDlqStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DlqStore for SqlDlqStore {
    async fn move_to_dlq(&self, job: &Job, final_error: &str) -> QueueResult<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let payload_str = serde_json::to_string(&job.payload)?;

        sqlx::query(
            "INSERT INTO dlq_entries (id, original_job_id, channel, payload, total_attempts,
                                      final_error, moved_to_dlq_at, replayed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, NULL)",
        )
        .bind(&id)
        .bind(&job.id)
        .bind(&job.channel)
        .bind(&payload_str)
        .bind(job.attempts)
        .bind(final_error)
        .bind(now.to_rfc3339())
        .execute(self.db.pool())
        .await?;

        Ok(id)
    }

    async fn get(&self, dlq_id: &str) -> QueueResult<Option<DlqEntry>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM dlq_entries WHERE id = ?",
            DLQ_COLUMNS
        ))
        .bind(dlq_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|r| entry_from_row(&r)).transpose()
    }

    async fn paginate(
        &self,
        page: i64,
        per_page: i64,
        channel: Option<&str>,
    ) -> QueueResult<Page<DlqEntry>> {
        let where_sql = if channel.is_some() {
            " WHERE channel = ?"
        } else {
            ""
        };

        let count_sql = format!("SELECT COUNT(*) AS total FROM dlq_entries{}", where_sql);
        let mut count_query = sqlx::query(&count_sql);
        if let Some(channel) = channel {
            count_query = count_query.bind(channel);
        }
        let total: i64 = count_query
            .fetch_one(self.db.pool())
            .await?
            .try_get("total")?;

        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);
        let offset = (page - 1) * per_page;

        let items_sql = format!(
            "SELECT {} FROM dlq_entries{} ORDER BY moved_to_dlq_at DESC, id DESC LIMIT ? OFFSET ?",
            DLQ_COLUMNS, where_sql
        );
        let mut items_query = sqlx::query(&items_sql);
        if let Some(channel) = channel {
            items_query = items_query.bind(channel);
        }
        let rows = items_query
            .bind(per_page)
            .bind(offset)
            .fetch_all(self.db.pool())
            .await?;

        let items = rows
            .iter()
            .map(entry_from_row)
            .collect::<QueueResult<_>>()?;
        Ok(Page {
            items,
            total,
            page,
            per_page,
        })
    }

    async fn stats(&self, now: DateTime<Utc>) -> QueueResult<DlqStats> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM dlq_entries")
            .fetch_one(self.db.pool())
            .await?
            .try_get("total")?;

        let day_ago = now - chrono::Duration::hours(24);
        let recent_24h: i64 =
            sqlx::query("SELECT COUNT(*) AS total FROM dlq_entries WHERE moved_to_dlq_at >= ?")
                .bind(day_ago.to_rfc3339())
                .fetch_one(self.db.pool())
                .await?
                .try_get("total")?;

        let rows = sqlx::query(
            "SELECT channel, COUNT(*) AS entries FROM dlq_entries GROUP BY channel",
        )
        .fetch_all(self.db.pool())
        .await?;

        let mut by_channel = HashMap::new();
        for row in rows {
            let channel: String = row.try_get("channel")?;
            let entries: i64 = row.try_get("entries")?;
            by_channel.insert(channel, entries);
        }

        Ok(DlqStats {
            total,
            recent_24h,
            by_channel,
        })
    }

    async fn mark_replayed(&self, dlq_id: &str, at: DateTime<Utc>) -> QueueResult<bool> {
        let result = sqlx::query("UPDATE dlq_entries SET replayed_at = ? WHERE id = ?")
            .bind(at.to_rfc3339())
            .bind(dlq_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn cleanup(
        &self,
        now: DateTime<Utc>,
        older_than_days: i64,
        dry_run: bool,
    ) -> QueueResult<u64> {
        let cutoff = (now - chrono::Duration::days(older_than_days)).to_rfc3339();

        if dry_run {
            let count: i64 =
                sqlx::query("SELECT COUNT(*) AS total FROM dlq_entries WHERE moved_to_dlq_at < ?")
                    .bind(&cutoff)
                    .fetch_one(self.db.pool())
                    .await?
                    .try_get("total")?;
            return Ok(count as u64);
        }

        let result = sqlx::query("DELETE FROM dlq_entries WHERE moved_to_dlq_at < ?")
            .bind(&cutoff)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected())
    }
}

fn entry_from_row(row: &AnyRow) -> QueueResult<DlqEntry> {
    let payload_str: String = row.try_get("payload")?;
    let payload: Value = serde_json::from_str(&payload_str).unwrap_or(Value::Null);
    let replayed_at: Option<DateTime<Utc>> = match row.try_get::<String, _>("replayed_at") {
        Ok(s) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        Err(_) => None, // NULL
    };

    Ok(DlqEntry {
        id: row.try_get("id")?,
        original_job_id: row.try_get("original_job_id")?,
        channel: row.try_get("channel")?,
        payload,
        total_attempts: row.try_get("total_attempts")?,
        final_error: row.try_get("final_error")?,
        moved_to_dlq_at: parse_date_col(row, "moved_to_dlq_at")?,
        replayed_at,
    })
}
