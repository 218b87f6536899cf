//! The persistence seam used by the synchronization engine and the server.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use folio_core::{ExternalProfile, Page, RepositoryRecord, RepositorySnapshot};

use crate::DbError;

pub const MAX_PAGE_SIZE: u32 = 100;

/// Keyed storage of synchronized entities.
///
/// Every write is an upsert keyed by entity identity and guarded by
/// `last_fetched_at`, so writes may land out of order: an older snapshot
/// never replaces a newer one. Sync writes never touch the curated
/// `featured` and `display_order` fields; only [`EntityStore::set_featured`]
/// does.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get_profile(&self, key: &str) -> Result<Option<ExternalProfile>, DbError>;

    /// Inserts or replaces the profile stored under `profile.key`.
    ///
    /// Returns the row that is stored afterwards. When the stored row is
    /// newer than `profile`, the write is discarded and the stored row is
    /// returned unchanged.
    async fn upsert_profile(&self, profile: ExternalProfile) -> Result<ExternalProfile, DbError>;

    /// All repositories of `owner`, stars descending.
    async fn get_repositories(&self, owner: &str) -> Result<Vec<RepositoryRecord>, DbError>;

    /// Upserts each snapshot by `(owner, external_id)` and returns the owner's
    /// full collection afterwards, stars descending.
    ///
    /// Repositories absent from `snapshots` are kept as they are.
    async fn upsert_repositories(
        &self,
        owner: &str,
        snapshots: Vec<RepositorySnapshot>,
        fetched_at: DateTime<Utc>,
    ) -> Result<Vec<RepositoryRecord>, DbError>;

    /// One page (1-based) of `owner`'s repositories, stars descending.
    async fn list_by_owner(
        &self,
        owner: &str,
        page: u32,
        size: u32,
    ) -> Result<Page<RepositoryRecord>, DbError>;

    /// Featured repositories across all owners, `display_order` ascending
    /// (unset last) then stars descending.
    async fn list_featured(&self) -> Result<Vec<RepositoryRecord>, DbError>;

    /// Operator mutation of the curated fields.
    ///
    /// # Errors
    ///
    /// [`DbError::NotFound`] if the repository is not stored.
    async fn set_featured(
        &self,
        owner: &str,
        external_id: i64,
        featured: bool,
        display_order: Option<i32>,
    ) -> Result<RepositoryRecord, DbError>;

    async fn health_check(&self) -> Result<(), DbError>;
}

/// Normalizes paging input: pages are 1-based, sizes fall in `1..=MAX_PAGE_SIZE`.
#[must_use]
pub fn clamp_page(page: u32, size: u32) -> (u32, u32) {
    (page.max(1), size.clamp(1, MAX_PAGE_SIZE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_page_bounds_inputs() {
        assert_eq!(clamp_page(0, 0), (1, 1));
        assert_eq!(clamp_page(3, 20), (3, 20));
        assert_eq!(clamp_page(1, 5_000), (1, MAX_PAGE_SIZE));
    }
}
