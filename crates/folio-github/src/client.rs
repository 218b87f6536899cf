//! HTTP client for the GitHub REST API.
//!
//! Every request goes through [`GithubClient::get_json`], which only accepts
//! a [`ValidatedPath`] and runs under the client's [`RetryPolicy`]. Response
//! bodies are never logged; usage events carry the sanitized endpoint, the
//! status code and the elapsed time.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use folio_core::{sanitize_for_log, RepositorySnapshot, UpstreamConfig};
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, ACCEPT, RETRY_AFTER};
use reqwest::{redirect, Client, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::endpoint::{validate_endpoint, validate_segment, ValidatedPath};
use crate::error::GithubError;
use crate::normalize::normalize_repository;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::types::{ProfilePayload, RateLimitStatus, RepositoryPayload};

const DEFAULT_BASE_URL: &str = "https://api.github.com/";
const API_VERSION: &str = "2022-11-28";
const REPOS_PER_PAGE: usize = 100;
/// Guards against cycling pagination; 1 000 repositories is plenty for a portfolio.
const MAX_REPO_PAGES: usize = 10;
const LANGUAGE_FETCH_CONCURRENCY: usize = 4;
/// Wait assumed when upstream signals rate limiting without saying for how long.
const DEFAULT_RATE_LIMIT_WAIT_SECS: u64 = 60;
const MAX_REDIRECTS: usize = 3;

/// Client for the GitHub REST API.
///
/// Stateless apart from its configuration, so one instance can be shared
/// across concurrent callers.
pub struct GithubClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
    retry: RetryPolicy,
}

impl GithubClient {
    /// Creates a client pointed at the public GitHub API.
    ///
    /// # Errors
    ///
    /// Returns [`GithubError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        token: Option<&str>,
        timeout_secs: u64,
        user_agent: &str,
        retry: RetryPolicy,
    ) -> Result<Self, GithubError> {
        Self::with_base_url(DEFAULT_BASE_URL, token, timeout_secs, user_agent, retry)
    }

    /// Creates a client from lazily loaded upstream configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GithubError::InvalidBaseUrl`] or [`GithubError::Http`].
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, GithubError> {
        if config.token.is_none() {
            tracing::warn!("GITHUB_TOKEN not set; upstream rate limits will be much lower");
        }
        Self::with_base_url(
            &config.base_url,
            config.token.as_deref(),
            config.timeout_secs,
            &config.user_agent,
            RetryPolicy::from_config(config),
        )
    }

    /// Creates a client with a custom base URL (for GitHub Enterprise or
    /// testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`GithubError::InvalidBaseUrl`] if `base_url` is not an
    /// absolute http(s) URL, or [`GithubError::Http`] if the underlying
    /// `reqwest::Client` cannot be constructed.
    pub fn with_base_url(
        base_url: &str,
        token: Option<&str>,
        timeout_secs: u64,
        user_agent: &str,
        retry: RetryPolicy,
    ) -> Result<Self, GithubError> {
        // Exactly one trailing slash so `Url::join` appends instead of
        // replacing the last path segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base = Url::parse(&normalised).map_err(|e| GithubError::InvalidBaseUrl {
            base_url: base_url.to_owned(),
            reason: e.to_string(),
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(GithubError::InvalidBaseUrl {
                base_url: base_url.to_owned(),
                reason: "scheme must be http or https".to_owned(),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .redirect(same_origin_redirects())
            .build()?;

        Ok(Self {
            client,
            base_url: base,
            token: token.map(str::to_owned),
            retry,
        })
    }

    /// Fetches `GET users/{username}`.
    ///
    /// # Errors
    ///
    /// - [`GithubError::InvalidEndpoint`] if `username` is not a single safe segment.
    /// - [`GithubError::Rejected`] on a 4xx other than rate limiting (e.g. unknown user).
    /// - [`GithubError::Unavailable`] once retries are exhausted.
    /// - [`GithubError::Deserialize`] if the body does not match.
    pub async fn fetch_profile(&self, username: &str) -> Result<ProfilePayload, GithubError> {
        let username = validate_segment(username)?;
        let path = validate_endpoint(&format!("users/{username}"))?;
        self.get_json(&path).await
    }

    /// Fetches every page of `GET users/{username}/repos`, most recently
    /// updated first, stopping at the first short page.
    ///
    /// # Errors
    ///
    /// Same as [`GithubClient::fetch_profile`].
    pub async fn fetch_repositories(
        &self,
        username: &str,
    ) -> Result<Vec<RepositoryPayload>, GithubError> {
        let username = validate_segment(username)?;
        let mut all = Vec::new();

        for page in 1..=MAX_REPO_PAGES {
            let path = validate_endpoint(&format!(
                "users/{username}/repos?per_page={REPOS_PER_PAGE}&page={page}&sort=updated&direction=desc"
            ))?;
            let batch: Vec<RepositoryPayload> = self.get_json(&path).await?;
            let short_page = batch.len() < REPOS_PER_PAGE;
            all.extend(batch);
            if short_page {
                return Ok(all);
            }
        }

        tracing::warn!(
            username = %sanitize_for_log(username),
            max_pages = MAX_REPO_PAGES,
            "repository pagination limit reached; remaining pages skipped"
        );
        Ok(all)
    }

    /// Fetches `GET repos/{owner}/{repo}/languages`.
    ///
    /// # Errors
    ///
    /// Same as [`GithubClient::fetch_profile`].
    pub async fn fetch_languages(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<BTreeMap<String, i64>, GithubError> {
        let owner = validate_segment(owner)?;
        let repo = validate_segment(repo)?;
        let path = validate_endpoint(&format!("repos/{owner}/{repo}/languages"))?;
        self.get_json(&path).await
    }

    /// Fetches the owner's repositories and, when `with_languages` is set,
    /// each repository's language breakdown.
    ///
    /// A failed language lookup degrades to an empty map for that repository
    /// instead of failing the whole collection.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`GithubClient::fetch_repositories`].
    pub async fn fetch_repository_snapshots(
        &self,
        username: &str,
        with_languages: bool,
    ) -> Result<Vec<RepositorySnapshot>, GithubError> {
        let payloads = self.fetch_repositories(username).await?;
        if !with_languages {
            return Ok(payloads
                .into_iter()
                .map(|p| normalize_repository(p, BTreeMap::new()))
                .collect());
        }

        let snapshots = stream::iter(payloads)
            .map(|payload| async move {
                let languages = match self.fetch_languages(username, &payload.name).await {
                    Ok(languages) => languages,
                    Err(e) => {
                        tracing::warn!(
                            repo = %sanitize_for_log(&payload.full_name),
                            error = %e,
                            "language breakdown unavailable; storing repository without it"
                        );
                        BTreeMap::new()
                    }
                };
                normalize_repository(payload, languages)
            })
            .buffered(LANGUAGE_FETCH_CONCURRENCY)
            .collect()
            .await;

        Ok(snapshots)
    }

    /// Fetches `GET rate_limit`. Does not count against the core quota.
    ///
    /// # Errors
    ///
    /// Same as [`GithubClient::fetch_profile`].
    pub async fn rate_limit(&self) -> Result<RateLimitStatus, GithubError> {
        let path = validate_endpoint("rate_limit")?;
        self.get_json(&path).await
    }

    /// Sends `GET {base}/{path}` under the retry policy and parses the body.
    ///
    /// # Errors
    ///
    /// See the variants of [`GithubError`].
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &ValidatedPath,
    ) -> Result<T, GithubError> {
        let url = self
            .base_url
            .join(path.as_str())
            .map_err(|e| GithubError::InvalidBaseUrl {
                base_url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;

        let body = retry_with_backoff(&self.retry, path.as_str(), || {
            self.send_once(url.clone(), path)
        })
        .await?;

        serde_json::from_str(&body).map_err(|e| GithubError::Deserialize {
            context: format!("GET {}", sanitize_for_log(path.as_str())),
            source: e,
        })
    }

    async fn send_once(&self, url: Url, path: &ValidatedPath) -> Result<String, GithubError> {
        let started = Instant::now();
        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                log_usage(path, None, started);
                return Err(e.into());
            }
        };
        let status = response.status();
        log_usage(path, Some(status), started);

        if let Some(retry_after_secs) =
            rate_limit_wait(status, response.headers(), chrono::Utc::now().timestamp())
        {
            return Err(GithubError::RateLimited { retry_after_secs });
        }
        if status.is_server_error() {
            return Err(GithubError::ServerError {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(GithubError::Rejected {
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

/// Follows redirects only while they stay on the origin of the first request.
fn same_origin_redirects() -> redirect::Policy {
    redirect::Policy::custom(|attempt| {
        let same_origin = attempt
            .previous()
            .first()
            .is_some_and(|first| first.origin() == attempt.url().origin());
        if same_origin && attempt.previous().len() <= MAX_REDIRECTS {
            attempt.follow()
        } else {
            attempt.stop()
        }
    })
}

/// Returns how long to wait when the response signals rate limiting.
///
/// GitHub signals it with 429, or with 403 plus `X-RateLimit-Remaining: 0`.
/// The wait comes from `Retry-After` (seconds), else `X-RateLimit-Reset`
/// (epoch seconds) relative to `now_epoch_secs`, else a fixed default.
pub(crate) fn rate_limit_wait(
    status: StatusCode,
    headers: &HeaderMap,
    now_epoch_secs: i64,
) -> Option<u64> {
    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let exhausted_window = header_str("x-ratelimit-remaining") == Some("0");
    let limited = status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && exhausted_window);
    if !limited {
        return None;
    }

    if let Some(secs) = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
    {
        return Some(secs);
    }

    if let Some(reset) = header_str("x-ratelimit-reset").and_then(|s| s.trim().parse::<i64>().ok())
    {
        let wait = reset.saturating_sub(now_epoch_secs).max(1);
        return Some(u64::try_from(wait).unwrap_or(DEFAULT_RATE_LIMIT_WAIT_SECS));
    }

    Some(DEFAULT_RATE_LIMIT_WAIT_SECS)
}

fn log_usage(path: &ValidatedPath, status: Option<StatusCode>, started: Instant) {
    tracing::info!(
        target: "folio::api_usage",
        provider = "github",
        method = "GET",
        endpoint = %sanitize_for_log(path.as_str()),
        status = status.map(|s| s.as_u16()),
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "upstream call"
    );
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
