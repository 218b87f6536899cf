use folio_core::ConfigError;
use folio_db::DbError;
use folio_github::GithubError;
use thiserror::Error;

/// Failure of one shared fetch.
///
/// Cloneable because every caller joined to a flight receives the same
/// outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("invalid endpoint: {reason}")]
    InvalidEndpoint { reason: String },

    #[error("upstream rejected request with HTTP {status}")]
    Rejected { status: u16 },

    #[error("upstream unavailable: {detail}")]
    Unavailable { detail: String },

    #[error("upstream misconfigured: {detail}")]
    Misconfigured { detail: String },

    #[error("entity store error: {detail}")]
    Store { detail: String },

    /// The task driving the fetch panicked or was cancelled.
    #[error("fetch aborted: {detail}")]
    Aborted { detail: String },
}

impl From<GithubError> for FetchError {
    fn from(err: GithubError) -> Self {
        match err {
            GithubError::InvalidEndpoint { reason } => Self::InvalidEndpoint {
                reason: reason.to_string(),
            },
            GithubError::Rejected { status } => Self::Rejected { status },
            other @ GithubError::InvalidBaseUrl { .. } => Self::Misconfigured {
                detail: other.to_string(),
            },
            GithubError::Http(e) => Self::Unavailable {
                detail: e.without_url().to_string(),
            },
            other @ (GithubError::RateLimited { .. }
            | GithubError::ServerError { .. }
            | GithubError::Unavailable { .. }
            | GithubError::Deserialize { .. }) => Self::Unavailable {
                detail: other.to_string(),
            },
        }
    }
}

impl From<DbError> for FetchError {
    fn from(err: DbError) -> Self {
        Self::Store {
            detail: err.to_string(),
        }
    }
}

impl From<ConfigError> for FetchError {
    fn from(err: ConfigError) -> Self {
        Self::Misconfigured {
            detail: err.to_string(),
        }
    }
}

/// Errors surfaced by [`crate::SyncEngine`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// The key cannot form a safe upstream path. Never masked by stale data.
    #[error("invalid endpoint: {reason}")]
    InvalidEndpoint { reason: String },

    /// No fresh data could be fetched and nothing is cached for `key`.
    #[error("sync failed for {key}: {cause}")]
    SyncFailed { key: String, cause: FetchError },

    #[error(transparent)]
    Store(#[from] DbError),
}
