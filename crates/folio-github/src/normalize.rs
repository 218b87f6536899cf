//! Mapping of upstream payloads onto stored entities.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use folio_core::{normalize_key, ExternalProfile, RepositorySnapshot};

use crate::types::{ProfilePayload, RepositoryPayload};

/// Builds an [`ExternalProfile`] keyed by the requested username.
///
/// The key comes from the request rather than `payload.login` so the cache
/// entry matches what callers look up.
#[must_use]
pub fn normalize_profile(
    requested_key: &str,
    payload: ProfilePayload,
    fetched_at: DateTime<Utc>,
) -> ExternalProfile {
    ExternalProfile {
        key: normalize_key(requested_key),
        display_name: non_blank(payload.name),
        bio: non_blank(payload.bio),
        followers: payload.followers,
        following: payload.following,
        public_repos: payload.public_repos,
        avatar_url: non_blank(payload.avatar_url),
        profile_url: non_blank(payload.html_url),
        company: non_blank(payload.company),
        location: non_blank(payload.location),
        blog: non_blank(payload.blog),
        twitter_username: non_blank(payload.twitter_username),
        hireable: payload.hireable,
        last_fetched_at: fetched_at,
    }
}

#[must_use]
pub fn normalize_repository(
    payload: RepositoryPayload,
    languages: BTreeMap<String, i64>,
) -> RepositorySnapshot {
    RepositorySnapshot {
        external_id: payload.id,
        name: payload.name,
        full_name: payload.full_name,
        description: non_blank(payload.description),
        html_url: payload.html_url,
        language: payload.language,
        languages,
        topics: payload.topics,
        stars: payload.stargazers_count,
        forks: payload.forks_count,
        pushed_at: payload.pushed_at,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
