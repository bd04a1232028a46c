use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::domain::errors::QueueResult;
use crate::domain::events::QueueEvent;

#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an event to all subscribers
    fn publish(&self, event: QueueEvent) -> QueueResult<()>;

    /// Subscribe to events
    /// Returns a stream of events, abstracting away underlying transport errors
    fn subscribe(&self) -> Pin<Box<dyn Stream<Item = Result<QueueEvent, String>> + Send>>;
}
