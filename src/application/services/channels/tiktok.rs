use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::ports::{ChannelPublisher, CredentialProvider, PublishError, PublishSuccess};

use super::{failure_from_response, http_client, require_credentials, require_str, transport_error};

const TRANSIENT_CODES: &[&str] = &[
    "rate_limit_exceeded",
    "internal_error",
    "service_unavailable",
    "spam_risk_too_many_posts",
];

/// Publishes videos through the TikTok Content Posting API
/// (`PULL_FROM_URL` source).
pub struct TikTokPublisher {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl TikTokPublisher {
    pub fn new(base_url: impl Into<String>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            http: http_client(),
            base_url: base_url.into(),
            credentials,
        }
    }
}

#[async_trait]
impl ChannelPublisher for TikTokPublisher {
    fn channel(&self) -> &str {
        "tiktok"
    }

    async fn publish(&self, payload: &Value) -> Result<PublishSuccess, PublishError> {
        let title = require_str(payload, "title", self.channel())?;
        let video_url = require_str(payload, "video_url", self.channel())?;

        let normalized = json!({
            "post_info": { "title": title },
            "source_info": { "source": "PULL_FROM_URL", "video_url": video_url },
        });

        let creds = require_credentials(self.credentials.as_ref(), self.channel()).await?;
        let response = self
            .http
            .post(format!(
                "{}/v2/post/publish/video/init/",
                self.base_url
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
        let remote_id = body
            .get("data")
            .and_then(|d| d.get("publish_id"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(PublishSuccess {
            remote_id,
            normalized,
        })
    }
}
