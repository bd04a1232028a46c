use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Successful publish: the artifact id on the external platform plus the
/// normalized payload that was actually sent.
#[derive(Debug, Clone)]
pub struct PublishSuccess {
    pub remote_id: String,
    pub normalized: Value,
}

/// Typed publish failure. Channels fill in whatever the vendor exposed; the
/// dispatcher falls back to the generic classifier when `retryable` is None.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PublishError {
    pub message: String,
    pub status_code: Option<u16>,
    pub error_code: Option<String>,
    retryable: Option<bool>,
}

impl PublishError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: None,
            error_code: None,
            retryable: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }

    /// Malformed payloads can never succeed on retry.
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::new(message).with_retryable(false)
    }

    /// The channel's own verdict, when it has one.
    pub fn is_retryable(&self) -> Option<bool> {
        self.retryable
    }
}

#[async_trait]
pub trait ChannelPublisher: Send + Sync {
    /// Channel tag this publisher serves, e.g. `meta_facebook`.
    fn channel(&self) -> &str;

    /// Normalize the payload and create the artifact on the external
    /// platform. Payload validation errors must be terminal.
    async fn publish(&self, payload: &Value) -> Result<PublishSuccess, PublishError>;
}
