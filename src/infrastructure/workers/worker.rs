use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info};

use crate::application::services::Dispatcher;
use crate::domain::errors::QueueResult;
use crate::domain::ports::{Clock, JobStore};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Seconds between polls when the queue is idle.
    pub poll_interval_secs: u64,
    /// Due jobs pulled per tick.
    pub batch_size: i64,
    /// In-flight dispatches per tick; one slow external API must not starve
    /// the rest of the batch.
    pub concurrency: usize,
    /// Running jobs untouched for this long are returned to pending.
    pub staleness_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            batch_size: 20,
            concurrency: 4,
            staleness_secs: 900, // 15 minutes
        }
    }
}

/// Polls for due jobs and feeds them through the dispatcher. Any number of
/// workers may run against the same store; the claim's conditional UPDATE is
/// the only coordination.
pub struct Worker {
    jobs: Arc<dyn JobStore>,
    dispatcher: Arc<Dispatcher>,
    clock: Arc<dyn Clock>,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        dispatcher: Arc<Dispatcher>,
        clock: Arc<dyn Clock>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            jobs,
            dispatcher,
            clock,
            config,
        }
    }

    pub async fn run(&self) {
        info!("Starting queue worker...");
        loop {
            match self.process_tick().await {
                Ok(processed) => {
                    if processed == 0 {
                        self.clock
                            .sleep(Duration::from_secs(self.config.poll_interval_secs))
                            .await;
                    }
                    // Drained a full batch? Poll again immediately.
                }
                Err(e) => {
                    error!("Worker tick failed: {}", e);
                    self.clock
                        .sleep(Duration::from_secs(self.config.poll_interval_secs))
                        .await;
                }
            }
        }
    }

    /// One poll cycle: sweep stuck jobs, claim and dispatch what is due.
    /// Returns the number of jobs this worker actually claimed.
    pub async fn process_tick(&self) -> QueueResult<usize> {
        let now = self.clock.now();

        let released = self
            .jobs
            .release_stuck(now, Duration::from_secs(self.config.staleness_secs))
            .await?;
        if released > 0 {
            info!("Released {} stuck running jobs back to pending", released);
        }

        let due = self.jobs.due_jobs(now, self.config.batch_size).await?;
        if due.is_empty() {
            return Ok(0);
        }

        let claimed: Vec<_> = stream::iter(due)
            .filter_map(|job| async move {
                match self.jobs.claim(&job, self.clock.now()).await {
                    Ok(Some(claimed)) => Some(claimed),
                    Ok(None) => {
                        // Another worker got there first; expected, not an error.
                        debug!("Job {} already claimed elsewhere", job.id);
                        None
                    }
                    Err(e) => {
                        error!("Failed to claim job {}: {}", job.id, e);
                        None
                    }
                }
            })
            .collect()
            .await;

        let processed = claimed.len();
        stream::iter(claimed)
            .for_each_concurrent(self.config.concurrency, |job| async move {
                if let Err(e) = self.dispatcher.handle(&job).await {
                    // Storage failure mid-dispatch; the stuck-job sweep will
                    // recover the row if it was left running.
                    error!("Dispatch of job {} failed: {}", job.id, e);
                }
            })
            .await;

        Ok(processed)
    }
}
