use std::sync::Arc;

use chrono::{DateTime, Utc};
use folio_core::{normalize_key, sanitize_for_log, ExternalProfile, RepositoryRecord};
use folio_db::EntityStore;
use folio_github::validate_segment;
use serde::Serialize;

use crate::error::{FetchError, SyncError};
use crate::flight::SingleFlight;
use crate::upstream::Upstream;

/// Where a synchronized value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SyncSource {
    /// Inside the cache window; no upstream call was made.
    Cached,
    Fetched,
    /// The refresh failed and the last stored value is served instead.
    Stale { warning: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synced<T> {
    pub value: T,
    pub source: SyncSource,
}

impl<T> Synced<T> {
    fn cached(value: T) -> Self {
        Self {
            value,
            source: SyncSource::Cached,
        }
    }

    fn fetched(value: T) -> Self {
        Self {
            value,
            source: SyncSource::Fetched,
        }
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self.source, SyncSource::Stale { .. })
    }
}

/// Serves profiles and repository collections from the store, refreshing
/// them upstream once they fall outside the cache window.
pub struct SyncEngine {
    store: Arc<dyn EntityStore>,
    upstream: Arc<dyn Upstream>,
    profiles: SingleFlight<Synced<ExternalProfile>>,
    repositories: SingleFlight<Synced<Vec<RepositoryRecord>>>,
}

impl SyncEngine {
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>, upstream: Arc<dyn Upstream>) -> Self {
        Self {
            store,
            upstream,
            profiles: SingleFlight::new(),
            repositories: SingleFlight::new(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    #[must_use]
    pub fn upstream(&self) -> &Arc<dyn Upstream> {
        &self.upstream
    }

    /// Returns the profile for `username`, fetching it when absent, stale or
    /// when `force_refresh` is set.
    ///
    /// # Errors
    ///
    /// - [`SyncError::InvalidEndpoint`] if `username` cannot form a safe path.
    /// - [`SyncError::SyncFailed`] if the fetch fails and nothing is cached.
    /// - [`SyncError::Store`] if the cached value cannot be read.
    pub async fn sync_profile(
        &self,
        username: &str,
        force_refresh: bool,
    ) -> Result<Synced<ExternalProfile>, SyncError> {
        let key = checked_key(username)?;
        let window = self.upstream.cache_window();

        let cached = self.store.get_profile(&key).await?;
        if let Some(profile) = &cached {
            if !force_refresh && !profile.is_stale(window, Utc::now()) {
                return Ok(Synced::cached(profile.clone()));
            }
        }

        let store = Arc::clone(&self.store);
        let upstream = Arc::clone(&self.upstream);
        let flight_key = key.clone();
        let outcome = self
            .profiles
            .run(&key, move || async move {
                // A flight that completed between our read and this one may
                // already have refreshed the entry.
                if !force_refresh {
                    if let Some(profile) = store.get_profile(&flight_key).await? {
                        if !profile.is_stale(window, Utc::now()) {
                            return Ok(Synced::cached(profile));
                        }
                    }
                }
                tracing::info!(username = %sanitize_for_log(&flight_key), "fetching profile upstream");
                let fresh = upstream.fetch_profile(&flight_key).await?;
                let stored = store.upsert_profile(fresh).await?;
                Ok(Synced::fetched(stored))
            })
            .await;

        settle(key, outcome, cached)
    }

    /// Returns all repositories of `owner`, refreshing the collection when it
    /// is absent, stale or when `force_refresh` is set.
    ///
    /// The collection is as fresh as its most recently fetched record; an
    /// owner with no stored records counts as absent.
    ///
    /// # Errors
    ///
    /// Same as [`SyncEngine::sync_profile`].
    pub async fn sync_repositories(
        &self,
        owner: &str,
        force_refresh: bool,
    ) -> Result<Synced<Vec<RepositoryRecord>>, SyncError> {
        let key = checked_key(owner)?;
        let window = self.upstream.cache_window();

        let stored = self.store.get_repositories(&key).await?;
        let cached = (!stored.is_empty()).then_some(stored);
        if let Some(records) = &cached {
            let stale = collection_fetched_at(records)
                .map_or(true, |at| window.is_stale(at, Utc::now()));
            if !force_refresh && !stale {
                return Ok(Synced::cached(records.clone()));
            }
        }

        let store = Arc::clone(&self.store);
        let upstream = Arc::clone(&self.upstream);
        let flight_key = key.clone();
        let outcome = self
            .repositories
            .run(&key, move || async move {
                if !force_refresh {
                    let current = store.get_repositories(&flight_key).await?;
                    if let Some(at) = collection_fetched_at(&current) {
                        if !window.is_stale(at, Utc::now()) {
                            return Ok(Synced::cached(current));
                        }
                    }
                }
                tracing::info!(owner = %sanitize_for_log(&flight_key), "fetching repositories upstream");
                let snapshots = upstream.fetch_repositories(&flight_key).await?;
                let fetched = snapshots.len();
                let records = store
                    .upsert_repositories(&flight_key, snapshots, Utc::now())
                    .await?;
                tracing::info!(
                    owner = %sanitize_for_log(&flight_key),
                    fetched,
                    stored = records.len(),
                    "repositories synchronized"
                );
                Ok(Synced::fetched(records))
            })
            .await;

        settle(key, outcome, cached)
    }
}

/// Normalizes the caller's key and rejects anything that cannot be a single
/// safe path segment before the store or upstream see it.
fn checked_key(raw: &str) -> Result<String, SyncError> {
    let key = normalize_key(raw);
    validate_segment(&key).map_err(|e| match FetchError::from(e) {
        FetchError::InvalidEndpoint { reason } => SyncError::InvalidEndpoint { reason },
        other => SyncError::InvalidEndpoint {
            reason: other.to_string(),
        },
    })?;
    Ok(key)
}

fn collection_fetched_at(records: &[RepositoryRecord]) -> Option<DateTime<Utc>> {
    records.iter().map(|r| r.last_fetched_at).max()
}

/// Turns a flight outcome into the caller's result, falling back to the
/// cached value when the refresh failed.
fn settle<T>(
    key: String,
    outcome: Result<Synced<T>, FetchError>,
    cached: Option<T>,
) -> Result<Synced<T>, SyncError> {
    let cause = match outcome {
        Ok(synced) => return Ok(synced),
        Err(FetchError::InvalidEndpoint { reason }) => {
            return Err(SyncError::InvalidEndpoint { reason })
        }
        Err(cause) => cause,
    };

    match cached {
        Some(value) => {
            tracing::warn!(
                key = %sanitize_for_log(&key),
                error = %cause,
                "refresh failed; serving stale cached value"
            );
            Ok(Synced {
                value,
                source: SyncSource::Stale {
                    warning: format!("showing cached data; refresh failed: {cause}"),
                },
            })
        }
        None => {
            tracing::warn!(key = %sanitize_for_log(&key), error = %cause, "sync failed with nothing cached");
            Err(SyncError::SyncFailed { key, cause })
        }
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
