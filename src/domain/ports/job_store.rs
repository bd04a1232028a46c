use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::entities::{FailureOutcome, Job, JobFilter, Page};
use crate::domain::errors::QueueResult;

/// Persistence contract for the live job table.
///
/// `claim` is the single operation requiring true concurrency correctness: it
/// must be one conditional UPDATE so N concurrent claimers get exactly one
/// winner. Everything else only needs per-row consistency.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new pending job. If a live (pending/running) job already
    /// exists for `(channel, idempotency_key)`, the existing job is returned
    /// instead; keys become reusable once the earlier job is terminal.
    /// A missing key is filled with a generated UUID.
    async fn enqueue(
        &self,
        channel: &str,
        payload: Value,
        run_at: DateTime<Utc>,
        idempotency_key: Option<String>,
    ) -> QueueResult<Job>;

    /// Atomically transition `pending` -> `running` for a job that is due,
    /// incrementing `attempts`. Returns `None` when the job was already
    /// claimed, completed or failed by a concurrent worker.
    async fn claim(&self, job: &Job, now: DateTime<Utc>) -> QueueResult<Option<Job>>;

    async fn mark_completed(&self, job_id: &str, remote_id: Option<&str>) -> QueueResult<()>;

    /// Retryable failures under the attempt ceiling go back to `pending` with
    /// a backoff-computed `run_at`; everything else flips the row to `failed`
    /// and moves a copy to the DLQ.
    async fn mark_failed(
        &self,
        job: &Job,
        error: &str,
        retryable: bool,
    ) -> QueueResult<FailureOutcome>;

    /// Return a running job to `pending` at `run_at` without consulting the
    /// attempt ceiling. Used when the call never reached the external service
    /// (circuit open); such failures must not dead-letter a job.
    async fn reschedule(
        &self,
        job_id: &str,
        run_at: DateTime<Utc>,
        error: &str,
    ) -> QueueResult<bool>;

    /// Force a pending or failed job back into the runnable set immediately.
    async fn replay(&self, job_id: &str) -> QueueResult<bool>;

    async fn find_by_id(&self, job_id: &str) -> QueueResult<Option<Job>>;

    /// Pending jobs with `run_at <= now`, ordered by `(run_at, id)` ascending.
    async fn due_jobs(&self, now: DateTime<Utc>, limit: i64) -> QueueResult<Vec<Job>>;

    async fn paginate(&self, page: i64, per_page: i64, filter: &JobFilter)
        -> QueueResult<Page<Job>>;

    /// Count of running jobs grouped by channel, for backpressure visibility.
    async fn running_channels(&self) -> QueueResult<HashMap<String, i64>>;

    /// Record a follow-up job on its parent. The parent does not own the
    /// child's lifecycle; this is purely a reference.
    async fn link_child(&self, parent_id: &str, child_id: &str) -> QueueResult<bool>;

    /// Sweep `running` jobs untouched for longer than `staleness` back to
    /// `pending`. Recovers work orphaned by a crashed worker.
    async fn release_stuck(&self, now: DateTime<Utc>, staleness: Duration) -> QueueResult<u64>;
}
