//! The fetch side of synchronization.

use std::env::VarError;
use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::Utc;
use folio_core::{
    build_upstream_config, CachePolicyWindow, ExternalProfile, RepositorySnapshot, UpstreamConfig,
};
use folio_github::{normalize_profile, GithubClient, RateLimitStatus};

use crate::error::FetchError;

/// Source of fresh entities.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// How long a fetched entity stays fresh.
    fn cache_window(&self) -> CachePolicyWindow;

    /// Fetches the profile for an already-normalized `key`, stamped with the
    /// time the fetch completed.
    async fn fetch_profile(&self, key: &str) -> Result<ExternalProfile, FetchError>;

    async fn fetch_repositories(&self, owner: &str)
        -> Result<Vec<RepositorySnapshot>, FetchError>;

    async fn rate_limit(&self) -> Result<RateLimitStatus, FetchError> {
        Err(FetchError::Unavailable {
            detail: "rate-limit status is not supported by this upstream".to_string(),
        })
    }
}

/// [`Upstream`] backed by the GitHub REST API.
pub struct GithubUpstream {
    client: GithubClient,
    fetch_languages: bool,
    window: CachePolicyWindow,
}

impl GithubUpstream {
    #[must_use]
    pub fn new(client: GithubClient, fetch_languages: bool, window: CachePolicyWindow) -> Self {
        Self {
            client,
            fetch_languages,
            window,
        }
    }

    /// # Errors
    ///
    /// Returns [`FetchError::Misconfigured`] if the HTTP client cannot be built.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, FetchError> {
        Ok(Self::new(
            GithubClient::from_config(config)?,
            config.fetch_languages,
            CachePolicyWindow::from_hours(config.cache_window_hours),
        ))
    }
}

#[async_trait]
impl Upstream for GithubUpstream {
    fn cache_window(&self) -> CachePolicyWindow {
        self.window
    }

    async fn fetch_profile(&self, key: &str) -> Result<ExternalProfile, FetchError> {
        let payload = self.client.fetch_profile(key).await?;
        Ok(normalize_profile(key, payload, Utc::now()))
    }

    async fn fetch_repositories(
        &self,
        owner: &str,
    ) -> Result<Vec<RepositorySnapshot>, FetchError> {
        Ok(self
            .client
            .fetch_repository_snapshots(owner, self.fetch_languages)
            .await?)
    }

    async fn rate_limit(&self) -> Result<RateLimitStatus, FetchError> {
        Ok(self.client.rate_limit().await?)
    }
}

type Lookup = Box<dyn Fn(&str) -> Result<String, VarError> + Send + Sync>;

/// [`GithubUpstream`] whose configuration is read on first use.
///
/// Platform-injected variables may not be present yet when the process
/// boots, so nothing is read at construction. The outcome of the first
/// resolution, success or failure, is kept for the process lifetime.
pub struct LazyUpstream {
    lookup: Lookup,
    resolved: OnceLock<Result<GithubUpstream, FetchError>>,
}

impl LazyUpstream {
    #[must_use]
    pub fn from_env() -> Self {
        Self::with_lookup(|var| std::env::var(var))
    }

    #[must_use]
    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Result<String, VarError> + Send + Sync + 'static,
    {
        Self {
            lookup: Box::new(lookup),
            resolved: OnceLock::new(),
        }
    }

    fn resolve(&self) -> Result<&GithubUpstream, FetchError> {
        self.resolved
            .get_or_init(|| {
                let config = build_upstream_config(|var| (self.lookup)(var))?;
                tracing::info!(
                    base_url = %config.base_url,
                    cache_window_hours = config.cache_window_hours,
                    authenticated = config.token.is_some(),
                    "upstream client configured"
                );
                GithubUpstream::from_config(&config)
            })
            .as_ref()
            .map_err(|e| {
                tracing::debug!(error = %e, "upstream configuration unavailable");
                e.clone()
            })
    }
}

#[async_trait]
impl Upstream for LazyUpstream {
    fn cache_window(&self) -> CachePolicyWindow {
        self.resolve()
            .map_or_else(|_| CachePolicyWindow::default(), |resolved| resolved.window)
    }

    async fn fetch_profile(&self, key: &str) -> Result<ExternalProfile, FetchError> {
        self.resolve()?.fetch_profile(key).await
    }

    async fn fetch_repositories(
        &self,
        owner: &str,
    ) -> Result<Vec<RepositorySnapshot>, FetchError> {
        self.resolve()?.fetch_repositories(owner).await
    }

    async fn rate_limit(&self) -> Result<RateLimitStatus, FetchError> {
        self.resolve()?.rate_limit().await
    }
}
