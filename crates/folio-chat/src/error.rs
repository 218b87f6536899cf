use thiserror::Error;

/// Errors surfaced by the chat layer.
///
/// Cloneable because a failed construction is cached and replayed to every
/// later request for the same provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Misconfigured or unreachable at construction; sticky for the process.
    #[error("chat provider {provider} is unavailable: {reason}")]
    Unavailable {
        provider: &'static str,
        reason: String,
    },

    #[error("unknown chat provider: {0}")]
    UnknownProvider(String),

    #[error("invalid chat request: {reason}")]
    InvalidRequest { reason: String },

    /// The provider answered a request with a failure status or not at all.
    #[error("chat provider {provider} request failed: {detail}")]
    Upstream {
        provider: &'static str,
        status: Option<u16>,
        detail: String,
    },

    #[error("chat provider {provider} returned an unexpected response: {detail}")]
    MalformedReply {
        provider: &'static str,
        detail: String,
    },
}
