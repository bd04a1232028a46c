use async_trait::async_trait;

use crate::domain::entities::BreakerState;
use crate::domain::errors::QueueResult;

/// Persistence behind the circuit breaker registry. Records are keyed by
/// external service name and never deleted.
#[async_trait]
pub trait BreakerStore: Send + Sync {
    async fn load(&self, service: &str) -> QueueResult<Option<BreakerState>>;
    async fn save(&self, state: &BreakerState) -> QueueResult<()>;
    async fn list(&self) -> QueueResult<Vec<BreakerState>>;
}
