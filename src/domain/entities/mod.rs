pub mod breaker;
pub mod dlq;
pub mod job;

pub use breaker::{BreakerState, BreakerStatus};
pub use dlq::{DlqEntry, DlqStats};
pub use job::{FailureOutcome, Job, JobFilter, JobStatus, Page};
