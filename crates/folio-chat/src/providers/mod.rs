//! HTTP clients for the supported chat backends.
//!
//! All of them share [`HttpTransport`], which owns the `reqwest::Client`,
//! emits the API-usage event and maps failure statuses onto
//! [`ProviderError::Upstream`]. Request and response bodies are never logged.

mod anthropic;
mod gemini;
mod llama;
mod ollama;
mod openai;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use llama::LlamaProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use std::time::{Duration, Instant};

use folio_core::sanitize_for_log;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::ProviderError;
use crate::kind::ProviderKind;
use crate::settings::ProviderSettings;

pub(crate) struct HttpTransport {
    client: Client,
    kind: ProviderKind,
}

impl HttpTransport {
    pub(crate) fn new(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ProviderError::Unavailable {
                provider: settings.kind.as_str(),
                reason: format!("HTTP client construction failed: {e}"),
            })?;
        Ok(Self {
            client,
            kind: settings.kind,
        })
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    /// Sends `request` and parses a successful JSON body as `T`.
    ///
    /// `endpoint` is the label used in the usage event; it must not carry
    /// credentials.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, ProviderError> {
        let provider = self.kind.as_str();
        let request = request.build().map_err(|e| ProviderError::InvalidRequest {
            reason: e.without_url().to_string(),
        })?;
        let method = request.method().clone();
        let started = Instant::now();

        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                self.log_usage(&method, endpoint, None, started);
                return Err(ProviderError::Upstream {
                    provider,
                    status: None,
                    detail: e.without_url().to_string(),
                });
            }
        };
        let status = response.status();
        self.log_usage(&method, endpoint, Some(status), started);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream {
                provider,
                status: Some(status.as_u16()),
                detail: error_detail(status, &body),
            });
        }

        let body = response.text().await.map_err(|e| ProviderError::Upstream {
            provider,
            status: Some(status.as_u16()),
            detail: e.without_url().to_string(),
        })?;
        serde_json::from_str(&body).map_err(|e| ProviderError::MalformedReply {
            provider,
            detail: e.to_string(),
        })
    }

    fn log_usage(&self, method: &Method, endpoint: &str, status: Option<StatusCode>, started: Instant) {
        tracing::info!(
            target: "folio::api_usage",
            provider = self.kind.as_str(),
            method = %method,
            endpoint = %sanitize_for_log(endpoint),
            status = status.map(|s| s.as_u16()),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "upstream call"
        );
    }
}

/// Best-effort `error.message` from a provider error body, sanitized and
/// truncated, falling back to the status line.
fn error_detail(status: StatusCode, body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("error"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
        });
    match message {
        Some(message) => {
            let clean = sanitize_for_log(&message);
            let short: String = clean.chars().take(200).collect();
            format!("HTTP {status}: {short}")
        }
        None => format!("HTTP {status}"),
    }
}

pub(crate) fn require_key<'a>(settings: &'a ProviderSettings) -> Result<&'a str, ProviderError> {
    settings
        .api_key
        .as_deref()
        .ok_or_else(|| ProviderError::Unavailable {
            provider: settings.kind.as_str(),
            reason: "API key is not configured".to_string(),
        })
}

pub(crate) fn token_sum(parts: &[Option<u64>]) -> Option<u64> {
    if parts.iter().all(Option::is_none) {
        return None;
    }
    Some(parts.iter().flatten().sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_detail_prefers_structured_message() {
        let detail = error_detail(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"message":"model not found\nretry"}}"#,
        );
        assert_eq!(detail, "HTTP 400 Bad Request: model not foundretry");
    }

    #[test]
    fn error_detail_accepts_plain_error_string() {
        let detail = error_detail(StatusCode::SERVICE_UNAVAILABLE, r#"{"error":"Model is loading"}"#);
        assert!(detail.ends_with("Model is loading"));
    }

    #[test]
    fn error_detail_falls_back_to_status() {
        assert_eq!(
            error_detail(StatusCode::BAD_GATEWAY, "<html>"),
            "HTTP 502 Bad Gateway"
        );
    }

    #[test]
    fn token_sum_is_none_only_without_any_count() {
        assert_eq!(token_sum(&[None, None]), None);
        assert_eq!(token_sum(&[Some(3), None]), Some(3));
        assert_eq!(token_sum(&[Some(3), Some(4)]), Some(7));
    }
}
