use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::ports::{ChannelPublisher, CredentialProvider, PublishError, PublishSuccess};

use super::{
    failure_from_response, http_client, remote_id_from, require_credentials, require_str,
    transport_error,
};

const TRANSIENT_CODES: &[&str] = &[
    "resource_exhausted",
    "aborted",
    "unavailable",
    "internal_error",
    "backend_error",
];

/// Publishes local posts to the Google Business Profile API.
pub struct GoogleBusinessPublisher {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl GoogleBusinessPublisher {
    pub fn new(base_url: impl Into<String>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            http: http_client(),
            base_url: base_url.into(),
            credentials,
        }
    }
}

#[async_trait]
impl ChannelPublisher for GoogleBusinessPublisher {
    fn channel(&self) -> &str {
        "google_business"
    }

    async fn publish(&self, payload: &Value) -> Result<PublishSuccess, PublishError> {
        let summary = require_str(payload, "summary", self.channel())?;

        let mut normalized = json!({
            "languageCode": payload.get("language").and_then(Value::as_str).unwrap_or("en"),
            "summary": summary,
            "topicType": "STANDARD",
        });
        if let Some(url) = payload.get("cta_url").and_then(Value::as_str) {
            normalized["callToAction"] = json!({ "actionType": "LEARN_MORE", "url": url });
        }

        let creds = require_credentials(self.credentials.as_ref(), self.channel()).await?;
        let response = self
            .http
            .post(format!(
                "{}/v4/{}/localPosts",
                self.base_url, creds.account_id
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
            remote_id: remote_id_from(&body, &["name", "id"]),
            normalized,
        })
    }
}
