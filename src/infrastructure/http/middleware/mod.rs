pub mod error;

use std::sync::Arc;

use chrono_tz::Tz;

use crate::application::services::{CircuitBreakerRegistry, DlqService, QueueService};

pub use error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub queue_service: Arc<QueueService>,
    pub dlq_service: Arc<DlqService>,
    pub breakers: Arc<CircuitBreakerRegistry>,
    /// Zone used for display-only timestamp fields; storage is always UTC.
    pub display_tz: Tz,
}
