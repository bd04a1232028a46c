use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entities::{DlqEntry, DlqStats, Job, Page};
use crate::domain::errors::QueueResult;

#[async_trait]
pub trait DlqStore: Send + Sync {
    /// Copy a terminally failed job into the DLQ. Called by the job store
    /// when `mark_failed` decides the failure is terminal. Returns the new
    /// entry id.
    async fn move_to_dlq(&self, job: &Job, final_error: &str) -> QueueResult<String>;

    async fn get(&self, dlq_id: &str) -> QueueResult<Option<DlqEntry>>;

    async fn paginate(
        &self,
        page: i64,
        per_page: i64,
        channel: Option<&str>,
    ) -> QueueResult<Page<DlqEntry>>;

    async fn stats(&self, now: DateTime<Utc>) -> QueueResult<DlqStats>;

    /// Stamp an entry as replayed. The entry is kept for audit; replaying
    /// never mutates anything else on it.
    async fn mark_replayed(&self, dlq_id: &str, at: DateTime<Utc>) -> QueueResult<bool>;

    /// Purge entries older than the threshold. With `dry_run` the count is
    /// reported without deleting.
    async fn cleanup(
        &self,
        now: DateTime<Utc>,
        older_than_days: i64,
        dry_run: bool,
    ) -> QueueResult<u64>;
}
