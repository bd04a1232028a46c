use async_trait::async_trait;

use crate::domain::errors::QueueResult;

/// Opaque credentials for one channel. Token exchange and refresh live
/// outside this crate.
#[derive(Debug, Clone)]
pub struct ChannelCredentials {
    pub access_token: String,
    pub account_id: String,
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Returns `None` when the channel has no configured credentials.
    async fn credentials_for(&self, channel: &str) -> QueueResult<Option<ChannelCredentials>>;
}
