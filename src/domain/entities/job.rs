use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Terminal jobs no longer reserve their idempotency key.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl ToString for JobStatus {
    fn to_string(&self) -> String {
        match self {
            JobStatus::Pending => "pending".to_string(),
            JobStatus::Running => "running".to_string(),
            JobStatus::Completed => "completed".to_string(),
            JobStatus::Failed => "failed".to_string(),
        }
    }
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => JobStatus::Pending,
            "running" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Pending, // Default fallback
        }
    }
}

/// One unit of scheduled publishing work targeting exactly one channel.
///
/// `run_at`, `created_at` and `updated_at` are UTC; localization happens at
/// the display layer only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub channel: String,
    pub payload: Value,
    pub run_at: DateTime<Utc>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub error: Option<String>,
    pub idempotency_key: String,
    pub remote_id: String,
    pub child_job_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of `JobStore::mark_failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureOutcome {
    /// Retryable and under the attempt ceiling: back to pending at `run_at`.
    Rescheduled { run_at: DateTime<Utc> },
    /// Terminal error or attempts exhausted: job is failed, DLQ entry created.
    DeadLettered { dlq_id: String },
}

/// Filters for job pagination; predicates AND together.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub channel: Option<String>,
    /// Substring match against idempotency_key or error.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}
