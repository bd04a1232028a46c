use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::any::AnyRow;
use sqlx::Row;
use uuid::Uuid;

use crate::application::services::RetryPolicy;
use crate::domain::entities::{FailureOutcome, Job, JobFilter, JobStatus, Page};
use crate::domain::errors::QueueResult;
use crate::domain::ports::{DlqStore, JobStore};
use crate::infrastructure::persistence::Database;

const JOB_COLUMNS: &str = "id, status, channel, payload, run_at, attempts, max_attempts, error, \
                           idempotency_key, remote_id, child_job_id, created_at, updated_at";

/// SQL implementation of the JobStore
pub struct SqlJobStore {
    db: Database,
    policy: RetryPolicy,
    dlq: Arc<dyn DlqStore>,
}

impl SqlJobStore {
    pub fn new(db: Database, policy: RetryPolicy, dlq: Arc<dyn DlqStore>) -> Self {
        Self { db, policy, dlq }
    }

    async fn find_live_by_key(&self, channel: &str, key: &str) -> QueueResult<Option<Job>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM jobs
             WHERE channel = ? AND idempotency_key = ? AND status IN ('pending', 'running')
             LIMIT 1",
            JOB_COLUMNS
        ))
        .bind(channel)
        .bind(key)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|r| job_from_row(&r)).transpose()
    }
}

#[async_trait]
impl JobStore for SqlJobStore {
    async fn enqueue(
        &self,
        channel: &str,
        payload: Value,
        run_at: DateTime<Utc>,
        idempotency_key: Option<String>,
    ) -> QueueResult<Job> {
        let key = idempotency_key.unwrap_or_else(|| Uuid::new_v4().to_string());

        // Idempotent enqueue: a live job already holding this key wins. Keys
        // become reusable once the earlier job is terminal.
        if let Some(existing) = self.find_live_by_key(channel, &key).await? {
            return Ok(existing);
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let payload_str = serde_json::to_string(&payload)?;

        let inserted = sqlx::query(
            "INSERT INTO jobs (id, status, channel, payload, run_at, attempts, max_attempts,
                               error, idempotency_key, remote_id, child_job_id, created_at, updated_at)
             VALUES (?, 'pending', ?, ?, ?, 0, ?, NULL, ?, '', NULL, ?, ?)",
        )
        .bind(&id)
        .bind(channel)
        .bind(&payload_str)
        .bind(run_at.to_rfc3339())
        .bind(self.policy.max_attempts)
        .bind(&key)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(self.db.pool())
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) => {
                // A concurrent enqueue for the same key hit the partial
                // unique index first; return the winner.
                let is_unique_violation = e
                    .as_database_error()
                    .map(|db| {
                        let message = db.message();
                        message.contains("UNIQUE") || message.contains("unique")
                    })
                    .unwrap_or(false);
                if is_unique_violation {
                    if let Some(existing) = self.find_live_by_key(channel, &key).await? {
                        return Ok(existing);
                    }
                }
                return Err(e.into());
            }
        }

        Ok(Job {
            id,
            status: JobStatus::Pending,
            channel: channel.to_string(),
            payload,
            run_at,
            attempts: 0,
            max_attempts: self.policy.max_attempts,
            error: None,
            idempotency_key: key,
            remote_id: String::new(),
            child_job_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn claim(&self, job: &Job, now: DateTime<Utc>) -> QueueResult<Option<Job>> {
        // Single conditional UPDATE: exactly one of N concurrent claimers
        // matches the pending row. No read-then-write window.
        let result = sqlx::query(
            "UPDATE jobs
             SET status = 'running', attempts = attempts + 1, updated_at = ?
             WHERE id = ? AND status = 'pending' AND run_at <= ?",
        )
        .bind(now.to_rfc3339())
        .bind(&job.id)
        .bind(now.to_rfc3339())
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            // Lost the race, or the job is no longer due/pending.
            return Ok(None);
        }

        self.find_by_id(&job.id).await
    }

    async fn mark_completed(&self, job_id: &str, remote_id: Option<&str>) -> QueueResult<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE jobs
             SET status = 'completed', remote_id = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(remote_id.unwrap_or(""))
        .bind(now.to_rfc3339())
        .bind(job_id)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    async fn mark_failed(
        &self,
        job: &Job,
        error: &str,
        retryable: bool,
    ) -> QueueResult<FailureOutcome> {
        let now = Utc::now();

        if retryable && job.attempts < job.max_attempts {
            let run_at = self.policy.next_run_at(now, job.attempts);
            sqlx::query(
                "UPDATE jobs
                 SET status = 'pending', run_at = ?, error = ?, updated_at = ?
                 WHERE id = ?",
            )
            .bind(run_at.to_rfc3339())
            .bind(error)
            .bind(now.to_rfc3339())
            .bind(&job.id)
            .execute(self.db.pool())
            .await?;

            Ok(FailureOutcome::Rescheduled { run_at })
        } else {
            // Terminal: the row stays visible as 'failed', a copy goes to
            // the DLQ for manual replay.
            sqlx::query(
                "UPDATE jobs
                 SET status = 'failed', error = ?, updated_at = ?
                 WHERE id = ?",
            )
            .bind(error)
            .bind(now.to_rfc3339())
            .bind(&job.id)
            .execute(self.db.pool())
            .await?;

            let dlq_id = self.dlq.move_to_dlq(job, error).await?;
            Ok(FailureOutcome::DeadLettered { dlq_id })
        }
    }

    async fn reschedule(
        &self,
        job_id: &str,
        run_at: DateTime<Utc>,
        error: &str,
    ) -> QueueResult<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE jobs
             SET status = 'pending', run_at = ?, error = ?, updated_at = ?
             WHERE id = ? AND status = 'running'",
        )
        .bind(run_at.to_rfc3339())
        .bind(error)
        .bind(now.to_rfc3339())
        .bind(job_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn replay(&self, job_id: &str) -> QueueResult<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE jobs
             SET status = 'pending', run_at = ?, updated_at = ?
             WHERE id = ? AND status IN ('pending', 'failed')",
        )
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(job_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id(&self, job_id: &str) -> QueueResult<Option<Job>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM jobs WHERE id = ?",
            JOB_COLUMNS
        ))
        .bind(job_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|r| job_from_row(&r)).transpose()
    }

    async fn due_jobs(&self, now: DateTime<Utc>, limit: i64) -> QueueResult<Vec<Job>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM jobs
             WHERE status = 'pending' AND run_at <= ?
             ORDER BY run_at ASC, id ASC
             LIMIT ?",
            JOB_COLUMNS
        ))
        .bind(now.to_rfc3339())
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(job_from_row).collect()
    }

    async fn paginate(
        &self,
        page: i64,
        per_page: i64,
        filter: &JobFilter,
    ) -> QueueResult<Page<Job>> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut binds: Vec<String> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            binds.push(status.to_string());
        }
        if let Some(channel) = &filter.channel {
            conditions.push("channel = ?");
            binds.push(channel.clone());
        }
        if let Some(search) = &filter.search {
            conditions.push("(idempotency_key LIKE ? OR error LIKE ?)");
            let term = format!("%{}%", search);
            binds.push(term.clone());
            binds.push(term);
        }

        let where_sql = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) AS total FROM jobs{}", where_sql);
        let mut count_query = sqlx::query(&count_sql);
        for bind in &binds {
            count_query = count_query.bind(bind);
        }
        let total: i64 = count_query
            .fetch_one(self.db.pool())
            .await?
            .try_get("total")?;

        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);
        let offset = (page - 1) * per_page;

        let items_sql = format!(
            "SELECT {} FROM jobs{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            JOB_COLUMNS, where_sql
        );
        let mut items_query = sqlx::query(&items_sql);
        for bind in &binds {
            items_query = items_query.bind(bind);
        }
        let rows = items_query
            .bind(per_page)
            .bind(offset)
            .fetch_all(self.db.pool())
            .await?;

        let items = rows.iter().map(job_from_row).collect::<QueueResult<_>>()?;
        Ok(Page {
            items,
            total,
            page,
            per_page,
        })
    }

    async fn running_channels(&self) -> QueueResult<HashMap<String, i64>> {
        let rows = sqlx::query(
            "SELECT channel, COUNT(*) AS running
             FROM jobs
             WHERE status = 'running'
             GROUP BY channel",
        )
        .fetch_all(self.db.pool())
        .await?;

        let mut counts = HashMap::new();
        for row in rows {
            let channel: String = row.try_get("channel")?;
            let running: i64 = row.try_get("running")?;
            counts.insert(channel, running);
        }
        Ok(counts)
    }

    async fn link_child(&self, parent_id: &str, child_id: &str) -> QueueResult<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE jobs SET child_job_id = ?, updated_at = ? WHERE id = ?",
        )
        .bind(child_id)
        .bind(now.to_rfc3339())
        .bind(parent_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn release_stuck(&self, now: DateTime<Utc>, staleness: Duration) -> QueueResult<u64> {
        let cutoff = now - chrono::Duration::seconds(staleness.as_secs() as i64);
        let result = sqlx::query(
            "UPDATE jobs
             SET status = 'pending', updated_at = ?
             WHERE status = 'running' AND updated_at < ?",
        )
        .bind(now.to_rfc3339())
        .bind(cutoff.to_rfc3339())
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected())
    }
}

pub(crate) fn parse_date_col(row: &AnyRow, col: &str) -> QueueResult<DateTime<Utc>> {
    let s: String = row.try_get(col)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)).into())
}

fn job_from_row(row: &AnyRow) -> QueueResult<Job> {
    let status: String = row.try_get("status")?;
    let payload_str: String = row.try_get("payload")?;
    let payload: Value = serde_json::from_str(&payload_str).unwrap_or(Value::Null);
    let error: Option<String> = row.try_get("error").ok();
    let child_job_id: Option<String> = row.try_get("child_job_id").ok();

    Ok(Job {
        id: row.try_get("id")?,
        status: JobStatus::from(status),
        channel: row.try_get("channel")?,
        payload,
        run_at: parse_date_col(row, "run_at")?,
        attempts: row.try_get("attempts")?,
        max_attempts: row.try_get("max_attempts")?,
        error,
        idempotency_key: row.try_get("idempotency_key")?,
        remote_id: row.try_get("remote_id")?,
        child_job_id,
        created_at: parse_date_col(row, "created_at")?,
        updated_at: parse_date_col(row, "updated_at")?,
    })
}
