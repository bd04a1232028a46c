use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::ports::{ChannelPublisher, CredentialProvider, PublishError, PublishSuccess};

use super::{
    failure_from_response, http_client, remote_id_from, require_credentials, require_str,
    transport_error,
};

/// Graph API throttling and backend codes (4, 17, 32, 613 are the documented
/// rate limits; 1 and 2 are transient backend failures).
const TRANSIENT_CODES: &[&str] = &["1", "2", "4", "17", "32", "613", "rate_limit_exceeded"];

enum MetaTarget {
    Facebook,
    Instagram,
}

/// Publishes to the Meta Graph API. Facebook targets the page feed,
/// Instagram the media container endpoint; everything else is shared.
pub struct MetaPublisher {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
    target: MetaTarget,
}

impl MetaPublisher {
    pub fn facebook(base_url: impl Into<String>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            http: http_client(),
            base_url: base_url.into(),
            credentials,
            target: MetaTarget::Facebook,
        }
    }

    pub fn instagram(
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            http: http_client(),
            base_url: base_url.into(),
            credentials,
            target: MetaTarget::Instagram,
        }
    }

    fn normalize(&self, payload: &Value) -> Result<(Value, &'static str), PublishError> {
        match self.target {
            MetaTarget::Facebook => {
                let message = require_str(payload, "message", self.channel())?;
                let mut normalized = json!({ "message": message });
                if let Some(link) = payload.get("link").and_then(Value::as_str) {
                    normalized["link"] = Value::String(link.to_string());
                }
                Ok((normalized, "feed"))
            }
            MetaTarget::Instagram => {
                let caption = require_str(payload, "caption", self.channel())?;
                let image_url = require_str(payload, "image_url", self.channel())?;
                Ok((
                    json!({ "caption": caption, "image_url": image_url }),
                    "media",
                ))
            }
        }
    }
}

#[async_trait]
impl ChannelPublisher for MetaPublisher {
    fn channel(&self) -> &str {
        match self.target {
            MetaTarget::Facebook => "meta_facebook",
            MetaTarget::Instagram => "meta_instagram",
        }
    }

    async fn publish(&self, payload: &Value) -> Result<PublishSuccess, PublishError> {
        let (normalized, endpoint) = self.normalize(payload)?;

        let creds = require_credentials(self.credentials.as_ref(), self.channel()).await?;
        let response = self
            .http
            .post(format!(
                "{}/{}/{}",
                self.base_url, creds.account_id, endpoint
            ))
            .bearer_auth(&creds.access_token)
            .json(&normalized)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        if !(200..300).contains(&status) {
            return Err(failure_from_response(status, &body, TRANSIENT_CODES));
        }

        let body: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
        Ok(PublishSuccess {
            remote_id: remote_id_from(&body, &["id", "post_id"]),
            normalized,
        })
    }
}
