use std::sync::Arc;

use tracing::info;

use crate::domain::entities::{DlqEntry, DlqStats, Job, Page};
use crate::domain::errors::QueueResult;
use crate::domain::ports::{Clock, DlqStore, JobStore};

/// Manual-intervention surface for permanently failed work.
pub struct DlqService {
    dlq: Arc<dyn DlqStore>,
    jobs: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
}

impl DlqService {
    pub fn new(dlq: Arc<dyn DlqStore>, jobs: Arc<dyn JobStore>, clock: Arc<dyn Clock>) -> Self {
        Self { dlq, jobs, clock }
    }

    pub async fn paginate(
        &self,
        page: i64,
        per_page: i64,
        channel: Option<&str>,
    ) -> QueueResult<Page<DlqEntry>> {
        self.dlq.paginate(page, per_page, channel).await
    }

    pub async fn stats(&self) -> QueueResult<DlqStats> {
        self.dlq.stats(self.clock.now()).await
    }

    /// Re-enqueue a fresh pending job from a DLQ entry's stored payload.
    /// The entry is stamped as replayed and kept; the new job goes through
    /// the normal idempotent enqueue, so replaying an entry twice while the
    /// first replay is still live returns the same job.
    pub async fn retry(&self, dlq_id: &str) -> QueueResult<Option<Job>> {
        let Some(entry) = self.dlq.get(dlq_id).await? else {
            return Ok(None);
        };

        let now = self.clock.now();
        let job = self
            .jobs
            .enqueue(
                &entry.channel,
                entry.payload.clone(),
                now,
                Some(format!("dlq-replay-{}", entry.id)),
            )
            .await?;
        self.dlq.mark_replayed(&entry.id, now).await?;
        info!(
            "DLQ entry {} replayed as job {} on {}",
            entry.id, job.id, entry.channel
        );
        Ok(Some(job))
    }

    /// Purge old entries; with `dry_run` only the count is reported.
    pub async fn cleanup(&self, older_than_days: i64, dry_run: bool) -> QueueResult<u64> {
        let purged = self
            .dlq
            .cleanup(self.clock.now(), older_than_days, dry_run)
            .await?;
        if !dry_run && purged > 0 {
            info!("Purged {} DLQ entries older than {} days", purged, older_than_days);
        }
        Ok(purged)
    }
}
