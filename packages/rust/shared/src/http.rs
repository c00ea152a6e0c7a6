//! HTTP client construction and upstream error-body parsing.

use std::time::Duration;

use reqwest::{Client, ClientBuilder};

use crate::config::HttpConfig;
use crate::error::{BlogMateError, Result};

/// User-Agent string for every outbound request.
pub const USER_AGENT: &str = concat!("BlogMate/", env!("CARGO_PKG_VERSION"));

/// Client builder preset with the shared User-Agent, connect timeout and
/// redirect limit plus the given total request timeout.
///
/// Callers that need their own redirect policy override it on the builder.
pub fn client_builder(http: &HttpConfig, timeout_secs: u64) -> ClientBuilder {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(http.max_redirects))
        .connect_timeout(http.connect_timeout())
        .timeout(Duration::from_secs(timeout_secs))
}

/// Build a client from [`client_builder`].
pub fn build_client(http: &HttpConfig, timeout_secs: u64) -> Result<Client> {
    finish_client(client_builder(http, timeout_secs))
}

/// Build a configured builder, mapping failure into [`BlogMateError::Network`].
pub fn finish_client(builder: ClientBuilder) -> Result<Client> {
    builder
        .build()
        .map_err(|e| BlogMateError::Network(format!("failed to build HTTP client: {e}")))
}

/// Pull a human-readable message out of an upstream JSON error body.
///
/// Understands `{"error": {"message": ..}}` (Gemini, OpenAI),
/// `{"error": ".."}` and `{"message": ..}` (WordPress).
pub fn upstream_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    let message = value
        .get("error")
        .and_then(|e| e.get("message").or(Some(e)))
        .and_then(|m| m.as_str())
        .or_else(|| value.get("message").and_then(|m| m.as_str()))?;

    let message = message.trim();
    (!message.is_empty()).then(|| message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_error_message() {
        let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(upstream_message(body).as_deref(), Some("API key not valid."));
    }

    #[test]
    fn wordpress_message() {
        let body = r#"{"code":"rest_cannot_create","message":"Sorry, you are not allowed to create posts as this user.","data":{"status":401}}"#;
        assert_eq!(
            upstream_message(body).as_deref(),
            Some("Sorry, you are not allowed to create posts as this user.")
        );
    }

    #[test]
    fn flat_error_string() {
        assert_eq!(
            upstream_message(r#"{"error":"URL is required"}"#).as_deref(),
            Some("URL is required")
        );
    }

    #[test]
    fn non_json_or_blank_yields_none() {
        assert_eq!(upstream_message("<html>502 Bad Gateway</html>"), None);
        assert_eq!(upstream_message(r#"{"message":"  "}"#), None);
        assert_eq!(upstream_message(r#"{"status":"nope"}"#), None);
    }

    #[test]
    fn client_builds_with_defaults() {
        assert!(build_client(&HttpConfig::default(), 30).is_ok());
    }
}
