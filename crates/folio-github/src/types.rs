//! Wire types for the subset of the GitHub REST API that folio reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `GET users/{username}`
#[derive(Debug, Clone, Deserialize)]
pub struct ProfilePayload {
    pub login: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    #[serde(default)]
    pub public_repos: i64,
    #[serde(default)]
    pub followers: i64,
    #[serde(default)]
    pub following: i64,
    pub html_url: Option<String>,
    pub avatar_url: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    /// GitHub returns `""` rather than `null` when unset.
    pub blog: Option<String>,
    pub twitter_username: Option<String>,
    pub hireable: Option<bool>,
}

/// One element of `GET users/{username}/repos`.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryPayload {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub stargazers_count: i64,
    #[serde(default)]
    pub forks_count: i64,
    pub pushed_at: Option<DateTime<Utc>>,
}

/// `GET rate_limit`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitStatus {
    pub rate: RateWindow,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateWindow {
    pub limit: i64,
    pub remaining: i64,
    /// Epoch seconds at which the window resets.
    pub reset: i64,
    #[serde(default)]
    pub used: i64,
}
