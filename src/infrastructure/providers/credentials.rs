use async_trait::async_trait;

use crate::domain::errors::QueueResult;
use crate::domain::ports::{ChannelCredentials, CredentialProvider};

/// Credential provider backed by environment variables:
/// `CROSSPOST_<CHANNEL>_ACCESS_TOKEN` and `CROSSPOST_<CHANNEL>_ACCOUNT_ID`.
///
/// Token exchange and refresh are someone else's job; this crate only needs
/// something to put in the Authorization header.
pub struct EnvCredentialProvider;

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn credentials_for(&self, channel: &str) -> QueueResult<Option<ChannelCredentials>> {
        let prefix = format!("CROSSPOST_{}", channel.to_uppercase());
        let access_token = match std::env::var(format!("{}_ACCESS_TOKEN", prefix)) {
            Ok(token) if !token.is_empty() => token,
            _ => return Ok(None),
        };
        let account_id = std::env::var(format!("{}_ACCOUNT_ID", prefix)).unwrap_or_default();

        Ok(Some(ChannelCredentials {
            access_token,
            account_id,
        }))
    }
}
