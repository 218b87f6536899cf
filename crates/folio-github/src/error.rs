use thiserror::Error;

/// Errors returned by the upstream GitHub client.
#[derive(Debug, Error)]
pub enum GithubError {
    /// A path fragment failed validation before any request was built.
    #[error("invalid endpoint: {reason}")]
    InvalidEndpoint { reason: &'static str },

    /// Upstream answered with a non-retriable 4xx status.
    #[error("upstream rejected request with HTTP {status}")]
    Rejected { status: u16 },

    /// HTTP 429, or 403 with an exhausted rate-limit window.
    #[error("rate limited by upstream (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("upstream server error: HTTP {status}")]
    ServerError { status: u16 },

    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Retries or the retry time budget were exhausted.
    #[error("upstream unavailable after {attempts} attempt(s): {last_error}")]
    Unavailable { attempts: u32, last_error: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL \"{base_url}\": {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },
}
