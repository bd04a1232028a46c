use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;

use crate::domain::entities::{Job, JobFilter, Page};
use crate::domain::errors::{QueueError, QueueResult};
use crate::domain::ports::{Clock, JobStore};

/// Producer-facing facade over the job store: what REST controllers and CLI
/// diagnostics call. Dispatch never goes through here.
pub struct QueueService {
    jobs: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
}

impl QueueService {
    pub fn new(jobs: Arc<dyn JobStore>, clock: Arc<dyn Clock>) -> Self {
        Self { jobs, clock }
    }

    /// Enqueue a publishing job. A missing `run_at` means "as soon as
    /// possible"; retrying the same `(channel, idempotency_key)` submission
    /// returns the already-queued job.
    pub async fn enqueue(
        &self,
        channel: &str,
        payload: Value,
        run_at: Option<DateTime<Utc>>,
        idempotency_key: Option<String>,
    ) -> QueueResult<Job> {
        let run_at = run_at.unwrap_or_else(|| self.clock.now());
        let job = self
            .jobs
            .enqueue(channel, payload, run_at, idempotency_key)
            .await?;
        info!(
            "Enqueued job {} for {} scheduled at {}",
            job.id, job.channel, job.run_at
        );
        Ok(job)
    }

    /// Enqueue a follow-up job and link it on its parent. The link is purely
    /// a reference; the parent does not own the child's lifecycle.
    pub async fn enqueue_follow_up(
        &self,
        parent_job_id: &str,
        channel: &str,
        payload: Value,
        run_at: Option<DateTime<Utc>>,
        idempotency_key: Option<String>,
    ) -> QueueResult<Job> {
        if self.jobs.find_by_id(parent_job_id).await?.is_none() {
            return Err(QueueError::NotFound(format!(
                "parent job {}",
                parent_job_id
            )));
        }
        let child = self.enqueue(channel, payload, run_at, idempotency_key).await?;
        self.jobs.link_child(parent_job_id, &child.id).await?;
        Ok(child)
    }

    /// Force a failed or pending job back into the runnable set immediately.
    pub async fn replay(&self, job_id: &str) -> QueueResult<bool> {
        let replayed = self.jobs.replay(job_id).await?;
        if replayed {
            info!("Job {} forced back into the runnable set", job_id);
        }
        Ok(replayed)
    }

    pub async fn find(&self, job_id: &str) -> QueueResult<Option<Job>> {
        self.jobs.find_by_id(job_id).await
    }

    pub async fn paginate(
        &self,
        page: i64,
        per_page: i64,
        filter: &JobFilter,
    ) -> QueueResult<Page<Job>> {
        self.jobs.paginate(page, per_page, filter).await
    }

    pub async fn due_jobs(&self, limit: i64) -> QueueResult<Vec<Job>> {
        self.jobs.due_jobs(self.clock.now(), limit).await
    }

    pub async fn running_channels(&self) -> QueueResult<HashMap<String, i64>> {
        self.jobs.running_channels().await
    }
}
