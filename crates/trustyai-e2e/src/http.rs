//! HTTP plumbing shared by the TrustyAI client and the inference sender.

use crate::error::Result;
use bytes::Bytes;
use regex::Regex;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::sync::LazyLock;

/// Maximum length for a response body quoted in an error message.
const MAX_ERROR_BODY_LEN: usize = 256;

/// Regex pattern for JWT tokens (header.payload.signature).
#[allow(clippy::expect_used)]
static JWT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+(?:\.[A-Za-z0-9_-]*)?")
        .expect("JWT pattern is a valid regex")
});

/// Regex pattern for Bearer tokens in text (JWT or opaque `sha256~` OpenShift tokens).
#[allow(clippy::expect_used)]
static BEARER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)bearer\s+[A-Za-z0-9_~.\-]+").expect("Bearer pattern is a valid regex")
});

/// Sanitize a response body before it ends up in an error or a log line.
///
/// Bearer tokens go first so "Bearer <JWT>" is redacted as a whole, then
/// standalone JWTs, then the result is truncated on a char boundary.
pub fn sanitize_body(body: &str) -> String {
    let sanitized = BEARER_PATTERN.replace_all(body, "[BEARER_REDACTED]");
    let sanitized = JWT_PATTERN.replace_all(&sanitized, "[JWT_REDACTED]");

    if sanitized.len() <= MAX_ERROR_BODY_LEN {
        return sanitized.into_owned();
    }

    let mut cut = MAX_ERROR_BODY_LEN;
    while !sanitized.is_char_boundary(cut) {
        cut -= 1;
    }
    format!(
        "{}...[truncated]",
        sanitized.get(..cut).unwrap_or_default()
    )
}

/// Build the client used against cluster routes.
///
/// Routes are served with the cluster's self-signed ingress certificate, so
/// certificate verification is disabled.
pub fn insecure_client() -> Result<Client> {
    Ok(Client::builder()
        .danger_accept_invalid_certs(true)
        .build()?)
}

/// `Authorization` header value for a bearer token.
pub fn bearer(token: &SecretString) -> String {
    format!("Bearer {}", token.expose_secret())
}

/// A fully-read HTTP response, left uninterpreted.
#[derive(Debug, Clone)]
pub struct ServiceResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ServiceResponse {
    /// Drain a `reqwest::Response` into an owned value.
    pub async fn read(response: reqwest::Response) -> Result<Self> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok(Self {
            status,
            headers,
            body,
        })
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body as text, lossily decoded.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body parsed as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_redacts_bearer_and_jwt() {
        let body = "denied for Bearer sha256~abcDEF123 and token eyJhbGciOi.eyJzdWIiOi.c2ln";
        let sanitized = sanitize_body(body);

        assert!(sanitized.contains("[BEARER_REDACTED]"));
        assert!(sanitized.contains("[JWT_REDACTED]"));
        assert!(!sanitized.contains("sha256~abcDEF123"));
        assert!(!sanitized.contains("eyJhbGciOi"));
    }

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(1000);
        let sanitized = sanitize_body(&body);

        assert!(sanitized.ends_with("...[truncated]"));
        assert_eq!(sanitized.len(), MAX_ERROR_BODY_LEN + "...[truncated]".len());
    }

    #[test]
    fn test_sanitize_truncates_on_char_boundary() {
        let body = "é".repeat(300);
        let sanitized = sanitize_body(&body);
        assert!(sanitized.ends_with("...[truncated]"));
    }

    #[test]
    fn test_bearer_header() {
        let token = SecretString::from("sha256~token".to_string());
        assert_eq!(bearer(&token), "Bearer sha256~token");
    }

    #[test]
    fn test_service_response_json() {
        let response = ServiceResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from_static(br#"{"value": -0.25}"#),
        };

        let parsed: serde_json::Value = response.json().unwrap();
        assert!(response.is_success());
        assert_eq!(parsed["value"], -0.25);
        assert_eq!(response.text(), r#"{"value": -0.25}"#);
    }
}
