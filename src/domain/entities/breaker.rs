use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BreakerStatus {
    Closed,
    Open,
    HalfOpen,
}

impl ToString for BreakerStatus {
    fn to_string(&self) -> String {
        match self {
            BreakerStatus::Closed => "closed".to_string(),
            BreakerStatus::Open => "open".to_string(),
            BreakerStatus::HalfOpen => "half_open".to_string(),
        }
    }
}

impl From<String> for BreakerStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "closed" => BreakerStatus::Closed,
            "open" => BreakerStatus::Open,
            "half_open" => BreakerStatus::HalfOpen,
            _ => BreakerStatus::Closed, // Default fallback
        }
    }
}

/// Persisted circuit breaker state, keyed by external service name. Created
/// lazily on first use and never deleted; `reset` clears the counters but
/// keeps the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerState {
    pub service: String,
    pub status: BreakerStatus,
    pub failure_count: i32,
    pub opened_at: Option<DateTime<Utc>>,
    pub last_failure: Option<String>,
}

impl BreakerState {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            status: BreakerStatus::Closed,
            failure_count: 0,
            opened_at: None,
            last_failure: None,
        }
    }
}
