use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A degraded, terminal copy of a job that exhausted its retries or hit a
/// terminal error. Keeps the original payload so a human can replay it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    pub id: String,
    pub original_job_id: String,
    pub channel: String,
    pub payload: Value,
    pub total_attempts: i32,
    pub final_error: String,
    pub moved_to_dlq_at: DateTime<Utc>,
    /// Set when the entry was manually replayed; the entry itself is kept.
    pub replayed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DlqStats {
    pub total: i64,
    pub recent_24h: i64,
    pub by_channel: HashMap<String, i64>,
}
