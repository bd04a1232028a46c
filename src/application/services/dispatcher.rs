use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::application::services::circuit_breaker::{BreakerError, CircuitBreakerRegistry};
use crate::application::services::classifier;
use crate::domain::entities::{FailureOutcome, Job};
use crate::domain::errors::QueueResult;
use crate::domain::events::QueueEvent;
use crate::domain::ports::{ChannelPublisher, Clock, EventBus, JobStore};

/// Extension point invoked on the outgoing payload before dispatch, e.g. to
/// filter or decorate the message. Hooks run in registration order.
pub trait PayloadHook: Send + Sync {
    fn transform(&self, channel: &str, payload: Value) -> Value;
}

/// The one dispatcher shared by every channel. Channel-specific behavior is
/// confined to the registered `ChannelPublisher` implementations; the
/// orchestration - preview short-circuit, breaker wrapping, failure
/// classification, state bookkeeping - is identical for all of them.
pub struct Dispatcher {
    job_store: Arc<dyn JobStore>,
    breakers: Arc<CircuitBreakerRegistry>,
    event_bus: Arc<dyn EventBus>,
    clock: Arc<dyn Clock>,
    publishers: HashMap<String, Arc<dyn ChannelPublisher>>,
    hooks: Vec<Arc<dyn PayloadHook>>,
}

impl Dispatcher {
    pub fn new(
        job_store: Arc<dyn JobStore>,
        breakers: Arc<CircuitBreakerRegistry>,
        event_bus: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            job_store,
            breakers,
            event_bus,
            clock,
            publishers: HashMap::new(),
            hooks: Vec::new(),
        }
    }

    pub fn register_publisher(&mut self, publisher: Arc<dyn ChannelPublisher>) {
        self.publishers
            .insert(publisher.channel().to_string(), publisher);
    }

    pub fn register_hook(&mut self, hook: Arc<dyn PayloadHook>) {
        self.hooks.push(hook);
    }

    /// Handle one claimed job through to a settled state.
    ///
    /// Publish failures never escape: every failure path ends in
    /// `mark_failed` or `reschedule`. Only storage errors propagate, for the
    /// worker loop's supervision to deal with.
    pub async fn handle(&self, job: &Job) -> QueueResult<()> {
        let mut payload = job.payload.clone();
        for hook in &self.hooks {
            payload = hook.transform(&job.channel, payload);
        }

        // Dry-run: mark done without touching the external service.
        if payload
            .get("preview")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            self.job_store.mark_completed(&job.id, None).await?;
            info!("Job {} ({}) completed as preview", job.id, job.channel);
            return Ok(());
        }

        let Some(publisher) = self.publishers.get(&job.channel) else {
            let message = format!("No publisher registered for channel '{}'", job.channel);
            error!("Job {}: {}", job.id, message);
            let outcome = self.job_store.mark_failed(job, &message, false).await?;
            self.emit_failure(job, &message, &outcome);
            return Ok(());
        };

        let breaker = self.breakers.breaker(&job.channel).await;
        match breaker.call(publisher.publish(&payload)).await {
            Ok(success) => {
                self.job_store
                    .mark_completed(&job.id, Some(&success.remote_id))
                    .await?;
                info!(
                    "Job {} published to {} as {}",
                    job.id, job.channel, success.remote_id
                );
                let _ = self.event_bus.publish(QueueEvent::JobCompleted {
                    job_id: job.id.clone(),
                    channel: job.channel.clone(),
                    remote_id: success.remote_id,
                    timestamp: self.clock.now().to_rfc3339(),
                });
            }
            Err(BreakerError::Open(open)) => {
                // The external service was never reached; push the job past
                // the cooldown without consulting the attempt ceiling.
                let run_at =
                    self.clock.now() + chrono::Duration::seconds(open.retry_after_secs.max(1));
                let message = open.to_string();
                self.job_store.reschedule(&job.id, run_at, &message).await?;
                warn!(
                    "Job {} deferred to {}: circuit open for {}",
                    job.id, run_at, job.channel
                );
                let _ = self.event_bus.publish(QueueEvent::JobRescheduled {
                    job_id: job.id.clone(),
                    channel: job.channel.clone(),
                    attempts: job.attempts,
                    next_run_at: run_at.to_rfc3339(),
                    error: message,
                    timestamp: self.clock.now().to_rfc3339(),
                });
            }
            Err(BreakerError::Inner(err)) => {
                let retryable = classifier::should_retry_publish(&err);
                let outcome = self
                    .job_store
                    .mark_failed(job, &err.message, retryable)
                    .await?;
                self.emit_failure(job, &err.message, &outcome);
            }
        }

        Ok(())
    }

    fn emit_failure(&self, job: &Job, message: &str, outcome: &FailureOutcome) {
        match outcome {
            FailureOutcome::Rescheduled { run_at } => {
                warn!(
                    "Job {} ({}) failed on attempt {}, retrying at {}: {}",
                    job.id, job.channel, job.attempts, run_at, message
                );
                let _ = self.event_bus.publish(QueueEvent::JobRescheduled {
                    job_id: job.id.clone(),
                    channel: job.channel.clone(),
                    attempts: job.attempts,
                    next_run_at: run_at.to_rfc3339(),
                    error: message.to_string(),
                    timestamp: self.clock.now().to_rfc3339(),
                });
            }
            FailureOutcome::DeadLettered { dlq_id } => {
                error!(
                    "Job {} ({}) dead-lettered as {} after {} attempts: {}",
                    job.id, job.channel, dlq_id, job.attempts, message
                );
                let _ = self.event_bus.publish(QueueEvent::JobDeadLettered {
                    job_id: job.id.clone(),
                    channel: job.channel.clone(),
                    attempts: job.attempts,
                    error: message.to_string(),
                    timestamp: self.clock.now().to_rfc3339(),
                });
            }
        }
    }
}
