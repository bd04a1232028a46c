use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::domain::errors::QueueResult;
use crate::domain::events::QueueEvent;
use crate::domain::ports::EventBus;

/// Local in-memory implementation of EventBus
#[derive(Clone)]
pub struct LocalEventBus {
    tx: broadcast::Sender<QueueEvent>,
}

impl LocalEventBus {
    /// Create a new event bus with specified capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for LocalEventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl EventBus for LocalEventBus {
    fn publish(&self, event: QueueEvent) -> QueueResult<()> {
        // Fire-and-forget: nobody listening is not a failure.
        if let Err(e) = self.tx.send(event) {
            tracing::debug!("No active subscribers for event (or channel full): {}", e);
        }
        Ok(())
    }

    fn subscribe(&self) -> Pin<Box<dyn Stream<Item = Result<QueueEvent, String>> + Send>> {
        let rx = self.tx.subscribe();
        Box::pin(BroadcastStream::new(rx).map(|item| item.map_err(|e| e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_bus_creation() {
        let bus = LocalEventBus::new(100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_event_publish_subscribe() {
        let bus = LocalEventBus::new(100);
        let mut rx = bus.subscribe();

        let event = QueueEvent::JobCompleted {
            job_id: "job-1".to_string(),
            channel: "youtube".to_string(),
            remote_id: "yt_123".to_string(),
            timestamp: "2026-01-12T10:00:00Z".to_string(),
        };

        bus.publish(event).unwrap();

        let received = rx.next().await.unwrap().unwrap();
        match received {
            QueueEvent::JobCompleted {
                job_id, remote_id, ..
            } => {
                assert_eq!(job_id, "job-1");
                assert_eq!(remote_id, "yt_123");
            }
            _ => panic!("Unexpected event type"),
        }
    }
}
