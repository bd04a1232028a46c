use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Time source for scheduling math. All timestamps are UTC; tests supply a
/// manual implementation to step time deterministically.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    async fn sleep(&self, duration: Duration);
}
