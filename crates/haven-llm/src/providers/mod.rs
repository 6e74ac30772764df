//! Concrete provider implementations

use std::time::Duration;

use crate::{GatewayError, Result};

mod anthropic;
mod ollama;
mod openai;

pub use anthropic::AnthropicProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

/// Connection settings shared by provider constructors.
///
/// The `client` is built once per gateway instance and shared across
/// providers; per-request client creation is never done.
#[derive(Clone)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub client: reqwest::Client,
}

impl ProviderSettings {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            api_key: None,
            base_url: base_url.into(),
            client,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Build the shared outbound HTTP client with the gateway's pool limits.
pub fn shared_http_client(call_timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(call_timeout)
        .pool_max_idle_per_host(20)
        .pool_idle_timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| GatewayError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Map a transport error onto the gateway error taxonomy.
pub(crate) fn classify_transport_error(error: reqwest::Error, timeout: Duration) -> GatewayError {
    if error.is_timeout() {
        GatewayError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        GatewayError::Network(error.to_string())
    }
}

/// Map a non-success HTTP status onto the gateway error taxonomy.
pub(crate) fn classify_status(
    status: reqwest::StatusCode,
    retry_after_ms: Option<u64>,
    body: String,
) -> GatewayError {
    if status.as_u16() == 429 {
        GatewayError::RateLimited { retry_after_ms }
    } else if status.is_client_error() {
        GatewayError::BadRequest(truncate(&body, 200))
    } else {
        GatewayError::Provider {
            status: status.as_u16(),
            message: truncate(&body, 200),
        }
    }
}

pub(crate) fn parse_retry_after(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(|secs| secs * 1000)
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification_matches_taxonomy() {
        let rate_limited = classify_status(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            Some(2000),
            String::new(),
        );
        assert!(matches!(
            rate_limited,
            GatewayError::RateLimited {
                retry_after_ms: Some(2000)
            }
        ));

        let bad = classify_status(
            reqwest::StatusCode::UNPROCESSABLE_ENTITY,
            None,
            "invalid".to_string(),
        );
        assert!(matches!(bad, GatewayError::BadRequest(_)));
        assert!(!bad.is_retryable());

        let server = classify_status(
            reqwest::StatusCode::BAD_GATEWAY,
            None,
            "upstream".to_string(),
        );
        assert!(matches!(server, GatewayError::Provider { status: 502, .. }));
        assert!(server.is_retryable());
    }

    #[test]
    fn settings_debug_redacts_api_key() {
        let settings = ProviderSettings::new("http://localhost", reqwest::Client::new())
            .with_api_key("sk-secret");
        let debug = format!("{settings:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("***"));
    }
}
