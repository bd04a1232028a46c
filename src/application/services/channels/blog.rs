use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::ports::{ChannelPublisher, CredentialProvider, PublishError, PublishSuccess};

use super::{
    failure_from_response, http_client, remote_id_from, require_credentials, require_str,
    transport_error,
};

const TRANSIENT_CODES: &[&str] = &["internal_error", "service_unavailable", "rest_post_invalid_id"];

/// Publishes posts to the WordPress REST API (`wp-json/wp/v2/posts`).
pub struct BlogPublisher {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl BlogPublisher {
    pub fn new(base_url: impl Into<String>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            http: http_client(),
            base_url: base_url.into(),
            credentials,
        }
    }
}

#[async_trait]
impl ChannelPublisher for BlogPublisher {
    fn channel(&self) -> &str {
        "wordpress_blog"
    }

    async fn publish(&self, payload: &Value) -> Result<PublishSuccess, PublishError> {
        let title = require_str(payload, "title", self.channel())?;
        let content = require_str(payload, "content", self.channel())?;

        let normalized = json!({
            "title": title,
            "content": content,
            "status": payload.get("status").and_then(Value::as_str).unwrap_or("publish"),
        });

        let creds = require_credentials(self.credentials.as_ref(), self.channel()).await?;
        let response = self
            .http
            .post(format!("{}/wp-json/wp/v2/posts", self.base_url))
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
