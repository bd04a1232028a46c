/// Queue lifecycle events published for observers (admin widgets, diagnostics).
///
/// Timestamps are ISO 8601 strings; consumers render them, the queue never
/// reads them back.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    JobCompleted {
        job_id: String,
        channel: String,
        remote_id: String,
        timestamp: String, // ISO 8601
    },
    JobRescheduled {
        job_id: String,
        channel: String,
        attempts: i32,
        next_run_at: String, // ISO 8601
        error: String,
        timestamp: String, // ISO 8601
    },
    JobDeadLettered {
        job_id: String,
        channel: String,
        attempts: i32,
        error: String,
        timestamp: String, // ISO 8601
    },
}
