//! Channel publisher implementations.
//!
//! Each publisher owns payload normalization, the HTTP call and its vendor
//! error table; everything else about dispatch lives in the generic
//! dispatcher. Payload validation failures are terminal by construction.

use std::time::Duration;

use serde_json::Value;

use crate::application::services::classifier;
use crate::domain::ports::{ChannelCredentials, CredentialProvider, PublishError};

pub mod blog;
pub mod google_business;
pub mod meta;
pub mod tiktok;
pub mod youtube;

pub use blog::BlogPublisher;
pub use google_business::GoogleBusinessPublisher;
pub use meta::MetaPublisher;
pub use tiktok::TikTokPublisher;
pub use youtube::YouTubePublisher;

/// Shared outbound client; publisher timeouts live here, not in the
/// dispatcher.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to build HTTP client")
}

pub(crate) fn require_str<'a>(
    payload: &'a Value,
    key: &str,
    channel: &str,
) -> Result<&'a str, PublishError> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            PublishError::invalid_payload(format!(
                "Invalid request: {} payload missing '{}'",
                channel, key
            ))
        })
}

pub(crate) async fn require_credentials(
    provider: &dyn CredentialProvider,
    channel: &str,
) -> Result<ChannelCredentials, PublishError> {
    match provider.credentials_for(channel).await {
        Ok(Some(creds)) => Ok(creds),
        Ok(None) => Err(PublishError::new(format!(
            "Permission denied: no credentials configured for {}",
            channel
        ))
        .with_retryable(false)),
        Err(e) => Err(PublishError::new(format!("Credential lookup failed: {}", e))),
    }
}

pub(crate) fn transport_error(err: reqwest::Error) -> PublishError {
    if err.is_timeout() {
        PublishError::new(format!("Connection timeout after 30 seconds: {}", err))
            .with_retryable(true)
    } else if err.is_connect() {
        PublishError::new(format!("Connection failed: {}", err)).with_retryable(true)
    } else {
        // Unclear transport state; let the generic classifier decide.
        PublishError::new(format!("Network error: {}", err))
    }
}

/// Build the typed error for a non-2xx response: vendor code out of the body,
/// message with a capped body snippet, and the channel's retryable verdict
/// computed with the shared precedence rules.
pub(crate) fn failure_from_response(
    status: u16,
    body: &str,
    transient_codes: &[&str],
) -> PublishError {
    let code = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| extract_error_code(&v));

    let snippet: String = body.chars().take(500).collect();
    let message = if snippet.is_empty() {
        format!("HTTP {} error", status)
    } else {
        format!("HTTP {}: {}", status, snippet)
    };

    let retryable = classifier::should_retry_with_vendor_codes(
        &message,
        Some(status),
        code.as_deref(),
        transient_codes,
    );

    let mut err = PublishError::new(message)
        .with_status(status)
        .with_retryable(retryable);
    if let Some(code) = code {
        err = err.with_code(code);
    }
    err
}

/// Pull a vendor error code out of the common error body shapes:
/// `{"error": {"code": ...}}`, `{"error": {"reason": ...}}`,
/// `{"error": {"errors": [{"reason": ...}]}}`, `{"error_code": ...}`.
fn extract_error_code(body: &Value) -> Option<String> {
    if let Some(error) = body.get("error") {
        if let Some(code) = error.get("code") {
            return value_as_code(code);
        }
        if let Some(reason) = error.get("reason").and_then(Value::as_str) {
            return Some(reason.to_string());
        }
        if let Some(reason) = error
            .get("errors")
            .and_then(|e| e.get(0))
            .and_then(|e| e.get("reason"))
            .and_then(Value::as_str)
        {
            return Some(reason.to_string());
        }
        if let Some(code) = error.as_str() {
            return Some(code.to_string());
        }
    }
    body.get("error_code").and_then(value_as_code)
}

fn value_as_code(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First matching id field, or empty when the platform returned none
/// (previews and fire-and-forget endpoints).
pub(crate) fn remote_id_from(body: &Value, keys: &[&str]) -> String {
    for key in keys {
        if let Some(id) = body.get(*key).and_then(Value::as_str) {
            return id.to_string();
        }
        if let Some(id) = body.get(*key).and_then(Value::as_i64) {
            return id.to_string();
        }
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_error_code_shapes() {
        assert_eq!(
            extract_error_code(&json!({"error": {"code": 4}})),
            Some("4".to_string())
        );
        assert_eq!(
            extract_error_code(&json!({"error": {"reason": "quotaExceeded"}})),
            Some("quotaExceeded".to_string())
        );
        assert_eq!(
            extract_error_code(&json!({"error": {"errors": [{"reason": "backendError"}]}})),
            Some("backendError".to_string())
        );
        assert_eq!(
            extract_error_code(&json!({"error_code": "rate_limit_exceeded"})),
            Some("rate_limit_exceeded".to_string())
        );
        assert_eq!(extract_error_code(&json!({"ok": true})), None);
    }

    #[test]
    fn test_failure_from_response_verdicts() {
        let err = failure_from_response(503, "Service Unavailable", &[]);
        assert_eq!(err.status_code, Some(503));
        assert_eq!(err.is_retryable(), Some(true));

        let err = failure_from_response(400, r#"{"error": {"code": "invalid_media"}}"#, &[]);
        assert_eq!(err.is_retryable(), Some(false));
        assert_eq!(err.error_code.as_deref(), Some("invalid_media"));
    }

    #[test]
    fn test_remote_id_from_falls_back_to_empty() {
        assert_eq!(remote_id_from(&json!({"id": "abc"}), &["id"]), "abc");
        assert_eq!(remote_id_from(&json!({"id": 42}), &["id"]), "42");
        assert_eq!(remote_id_from(&json!({}), &["id", "name"]), "");
    }
}
