use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crosspost::domain::ports::{ChannelPublisher, PublishError, PublishSuccess};

/// Scripted publisher: pops one canned outcome per call and counts
/// invocations. The last outcome repeats once the script is exhausted.
pub struct ScriptedPublisher {
    channel: String,
    outcomes: Mutex<VecDeque<Result<PublishSuccess, PublishError>>>,
    calls: AtomicUsize,
}

impl ScriptedPublisher {
    pub fn new(
        channel: &str,
        outcomes: Vec<Result<PublishSuccess, PublishError>>,
    ) -> Self {
        Self {
            channel: channel.to_string(),
            outcomes: Mutex::new(outcomes.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn succeeding(channel: &str, remote_id: &str) -> Self {
        Self::new(
            channel,
            vec![Ok(PublishSuccess {
                remote_id: remote_id.to_string(),
                normalized: Value::Null,
            })],
        )
    }

    pub fn failing(channel: &str, error: PublishError) -> Self {
        Self::new(channel, vec![Err(error)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelPublisher for ScriptedPublisher {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn publish(&self, _payload: &Value) -> Result<PublishSuccess, PublishError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut outcomes = self.outcomes.lock().unwrap();
        if outcomes.len() > 1 {
            outcomes.pop_front().expect("scripted outcome")
        } else {
            outcomes.front().expect("scripted outcome").clone()
        }
    }
}
