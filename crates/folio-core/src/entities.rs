//! Synchronized snapshots of upstream identities and repositories.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Canonical form of an external key: trimmed and lower-cased.
///
/// Upstream usernames are case-insensitive, so `"OctoCat "` and `"octocat"`
/// must address the same cache entry.
#[must_use]
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Duration after which a cached entity must be re-verified upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicyWindow(TimeDelta);

impl CachePolicyWindow {
    #[must_use]
    pub fn from_hours(hours: u32) -> Self {
        Self(TimeDelta::hours(i64::from(hours)))
    }

    #[must_use]
    pub fn new(window: TimeDelta) -> Self {
        Self(window)
    }

    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        self.0
    }

    /// An entity is stale once strictly more than the window has elapsed.
    #[must_use]
    pub fn is_stale(&self, last_fetched_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(last_fetched_at) > self.0
    }
}

impl Default for CachePolicyWindow {
    fn default() -> Self {
        Self::from_hours(24)
    }
}

/// A synchronized snapshot of an upstream user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalProfile {
    /// Normalized username; see [`normalize_key`].
    pub key: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub followers: i64,
    pub following: i64,
    pub public_repos: i64,
    pub avatar_url: Option<String>,
    pub profile_url: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub blog: Option<String>,
    pub twitter_username: Option<String>,
    pub hireable: Option<bool>,
    pub last_fetched_at: DateTime<Utc>,
}

impl ExternalProfile {
    #[must_use]
    pub fn is_stale(&self, window: CachePolicyWindow, now: DateTime<Utc>) -> bool {
        window.is_stale(self.last_fetched_at, now)
    }
}

/// Repository fields that come from the upstream payload.
///
/// Deliberately carries no operator-curated state, so a sync write cannot
/// clobber `featured` or `display_order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySnapshot {
    pub external_id: i64,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: Option<String>,
    pub language: Option<String>,
    /// Language name to byte count.
    pub languages: BTreeMap<String, i64>,
    pub topics: Vec<String>,
    pub stars: i64,
    pub forks: i64,
    pub pushed_at: Option<DateTime<Utc>>,
}

/// A stored repository: upstream snapshot plus curation and fetch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub owner_key: String,
    #[serde(flatten)]
    pub snapshot: RepositorySnapshot,
    pub featured: bool,
    pub display_order: Option<i32>,
    pub last_fetched_at: DateTime<Utc>,
}

impl RepositoryRecord {
    /// First sighting of a repository; curation starts empty.
    #[must_use]
    pub fn from_snapshot(
        owner_key: &str,
        snapshot: RepositorySnapshot,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            owner_key: owner_key.to_string(),
            snapshot,
            featured: false,
            display_order: None,
            last_fetched_at: fetched_at,
        }
    }

    /// Applies a newer upstream snapshot in place.
    ///
    /// Returns `false` and leaves the record untouched when `fetched_at` is
    /// older than what is already stored. Curation fields are never touched.
    pub fn absorb(&mut self, snapshot: RepositorySnapshot, fetched_at: DateTime<Utc>) -> bool {
        if fetched_at < self.last_fetched_at {
            return false;
        }
        self.snapshot = snapshot;
        self.last_fetched_at = fetched_at;
        true
    }
}

/// One page of a listing plus totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub size: u32,
    pub pages: u64,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, total: u64, page: u32, size: u32) -> Self {
        let pages = if size == 0 {
            0
        } else {
            total.div_ceil(u64::from(size))
        };
        Self {
            items,
            total,
            page,
            size,
            pages,
        }
    }
}
