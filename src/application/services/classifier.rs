//! Transient-vs-terminal classification of external publish failures.
//!
//! Storage errors never go through here; the worker loop's own supervision
//! handles those.

use crate::domain::ports::PublishError;

/// HTTP status codes that warrant a retry.
const RETRYABLE_STATUS_CODES: &[u16] = &[408, 409, 423, 425, 429, 500, 502, 503, 504];

/// Case-insensitive message fragments pointing at a temporary condition.
const TRANSIENT_PATTERNS: &[&str] = &[
    "deadlock",
    "lock wait timeout",
    "timed out",
    "timeout",
    "connection reset",
    "service unavailable",
    "temporarily unavailable",
];

/// Message fragments that mean retrying can never succeed.
const TERMINAL_PATTERNS: &[&str] = &[
    "duplicate entry",
    "invalid request",
    "permission denied",
    "unauthorized",
    "forbidden",
];

/// Vendor error codes shared across the integrated platforms that signal a
/// temporary condition.
const TRANSIENT_VENDOR_CODES: &[&str] = &[
    "rate_limit_exceeded",
    "quota_exceeded",
    "backend_error",
    "internal_error",
    "resource_exhausted",
    "aborted",
    "unavailable",
    "service_unavailable",
];

/// Decide whether a failed publish attempt should be retried.
///
/// Rules apply in priority order: HTTP status, transient message patterns,
/// terminal message patterns, vendor error codes. Unknown errors are not
/// retried, so a misbehaving integration cannot cause a retry storm.
pub fn should_retry(message: &str, status_code: Option<u16>, error_code: Option<&str>) -> bool {
    should_retry_with_vendor_codes(message, status_code, error_code, &[])
}

/// Same rules, with a channel-specific vendor code table consulted alongside
/// the shared one. Channels use this to build the retryable verdict on their
/// typed errors so precedence stays identical everywhere.
pub fn should_retry_with_vendor_codes(
    message: &str,
    status_code: Option<u16>,
    error_code: Option<&str>,
    channel_transient_codes: &[&str],
) -> bool {
    if let Some(status) = status_code {
        if RETRYABLE_STATUS_CODES.contains(&status) {
            return true;
        }
        if (400..500).contains(&status) {
            return false;
        }
        if status >= 500 {
            return true;
        }
        // Sub-400 statuses carry no verdict; fall through to the message.
    }

    let message = message.to_lowercase();
    if TRANSIENT_PATTERNS.iter().any(|p| message.contains(p)) {
        return true;
    }
    if TERMINAL_PATTERNS.iter().any(|p| message.contains(p)) {
        return false;
    }

    if let Some(code) = error_code {
        let code = code.to_lowercase();
        if TRANSIENT_VENDOR_CODES.contains(&code.as_str())
            || channel_transient_codes
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&code))
        {
            return true;
        }
    }

    false
}

/// Classify a typed channel error: the channel's own verdict wins, the
/// generic rules above are the fallback. Keeps behavior consistent whether a
/// channel threw its typed error or a raw transport error.
pub fn should_retry_publish(err: &PublishError) -> bool {
    err.is_retryable()
        .unwrap_or_else(|| should_retry(&err.message, err.status_code, err.error_code.as_deref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_status_codes() {
        assert!(should_retry("HTTP 503 Service Unavailable", Some(503), None));
        assert!(should_retry("HTTP 429 Too Many Requests", Some(429), None));
        assert!(should_retry("HTTP 409 Conflict", Some(409), None));
        assert!(should_retry("HTTP 500 Internal Server Error", Some(500), None));
    }

    #[test]
    fn test_client_errors_are_terminal() {
        assert!(!should_retry("HTTP 400 Bad Request", Some(400), None));
        assert!(!should_retry("HTTP 403 Forbidden", Some(403), None));
        assert!(!should_retry("HTTP 404 Not Found", Some(404), None));
    }

    #[test]
    fn test_unlisted_5xx_defaults_to_retryable() {
        assert!(should_retry("HTTP 507 Insufficient Storage", Some(507), None));
    }

    #[test]
    fn test_status_takes_precedence_over_message() {
        // A 400 stays terminal even when the body mentions a timeout.
        assert!(!should_retry("HTTP 400: upstream timeout", Some(400), None));
    }

    #[test]
    fn test_transient_message_patterns() {
        assert!(should_retry("Deadlock found when trying to get lock", None, None));
        assert!(should_retry("Lock wait timeout exceeded", None, None));
        assert!(should_retry("connection reset by peer", None, None));
        assert!(should_retry("Service Unavailable", None, None));
    }

    #[test]
    fn test_terminal_message_patterns() {
        assert!(!should_retry("Duplicate entry 'x' for key", None, None));
        assert!(!should_retry("Invalid request: missing field", None, None));
        assert!(!should_retry("Permission denied", None, None));
        assert!(!should_retry("401 unauthorized", None, None));
    }

    #[test]
    fn test_transient_beats_terminal_pattern() {
        // "timed out" is checked before "forbidden".
        assert!(should_retry("forbidden zone request timed out", None, None));
    }

    #[test]
    fn test_vendor_codes() {
        assert!(should_retry("publish rejected", None, Some("rate_limit_exceeded")));
        assert!(should_retry("publish rejected", None, Some("quota_exceeded")));
        // Vendor codes match case-insensitively.
        assert!(should_retry("publish rejected", None, Some("Backend_Error")));
        assert!(!should_retry("publish rejected", None, Some("invalid_media")));
    }

    #[test]
    fn test_channel_vendor_table_extends_shared_one() {
        let table = &["quotaexceeded", "backenderror"];
        assert!(should_retry_with_vendor_codes(
            "publish rejected",
            None,
            Some("quotaExceeded"),
            table
        ));
        // Status rule still wins over the channel table.
        assert!(!should_retry_with_vendor_codes(
            "HTTP 403",
            Some(403),
            Some("quotaExceeded"),
            table
        ));
    }

    #[test]
    fn test_unknown_errors_fail_closed() {
        assert!(!should_retry("something strange happened", None, None));
    }

    #[test]
    fn test_typed_error_hint_wins() {
        let err = PublishError::new("HTTP 503 Service Unavailable")
            .with_status(503)
            .with_retryable(false);
        assert!(!should_retry_publish(&err));

        let err = PublishError::new("HTTP 503 Service Unavailable").with_status(503);
        assert!(should_retry_publish(&err));
    }
}
