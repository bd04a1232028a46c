use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::ports::{ChannelPublisher, CredentialProvider, PublishError, PublishSuccess};

use super::{
    failure_from_response, http_client, remote_id_from, require_credentials, require_str,
    transport_error,
};

/// YouTube Data API reasons, in both their camelCase and snake_case spellings.
const TRANSIENT_CODES: &[&str] = &[
    "quotaExceeded",
    "quota_exceeded",
    "backendError",
    "backend_error",
    "internalError",
    "internal_error",
    "rate_limit_exceeded",
];

/// Publishes videos through the YouTube Data API (`videos?part=snippet,status`).
pub struct YouTubePublisher {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl YouTubePublisher {
    pub fn new(base_url: impl Into<String>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            http: http_client(),
            base_url: base_url.into(),
            credentials,
        }
    }
}

#[async_trait]
impl ChannelPublisher for YouTubePublisher {
    fn channel(&self) -> &str {
        "youtube"
    }

    async fn publish(&self, payload: &Value) -> Result<PublishSuccess, PublishError> {
        let title = require_str(payload, "title", self.channel())?;

        let normalized = json!({
            "snippet": {
                "title": title,
                "description": payload.get("description").and_then(Value::as_str).unwrap_or(""),
            },
            "status": {
                "privacyStatus": payload.get("privacy").and_then(Value::as_str).unwrap_or("public"),
            },
        });

        let creds = require_credentials(self.credentials.as_ref(), self.channel()).await?;
        let response = self
            .http
            .post(format!(
                "{}/youtube/v3/videos?part=snippet,status",
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
        Ok(PublishSuccess {
            remote_id: remote_id_from(&body, &["id"]),
            normalized,
        })
    }
}
