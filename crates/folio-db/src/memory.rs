//! In-process [`EntityStore`] for development and tests.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use folio_core::{ExternalProfile, Page, RepositoryRecord, RepositorySnapshot};
use parking_lot::RwLock;

use crate::store::{clamp_page, EntityStore};
use crate::DbError;

#[derive(Default)]
struct Tables {
    profiles: HashMap<String, ExternalProfile>,
    /// owner key -> external id -> record
    repositories: HashMap<String, BTreeMap<i64, RepositoryRecord>>,
}

/// Entity store backed by process memory. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn owner_sorted(&self, owner: &str) -> Vec<RepositoryRecord> {
        let tables = self.tables.read();
        let mut records: Vec<_> = tables
            .repositories
            .get(owner)
            .map(|by_id| by_id.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by(by_stars);
        records
    }
}

fn by_stars(a: &RepositoryRecord, b: &RepositoryRecord) -> Ordering {
    b.snapshot
        .stars
        .cmp(&a.snapshot.stars)
        .then_with(|| a.snapshot.name.cmp(&b.snapshot.name))
}

fn by_display_order(a: &RepositoryRecord, b: &RepositoryRecord) -> Ordering {
    let order = match (a.display_order, b.display_order) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    order.then_with(|| by_stars(a, b))
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn get_profile(&self, key: &str) -> Result<Option<ExternalProfile>, DbError> {
        Ok(self.tables.read().profiles.get(key).cloned())
    }

    async fn upsert_profile(&self, profile: ExternalProfile) -> Result<ExternalProfile, DbError> {
        let mut tables = self.tables.write();
        match tables.profiles.get(&profile.key) {
            Some(stored) if stored.last_fetched_at > profile.last_fetched_at => {
                tracing::debug!("discarding profile write older than stored row");
                Ok(stored.clone())
            }
            _ => {
                tables
                    .profiles
                    .insert(profile.key.clone(), profile.clone());
                Ok(profile)
            }
        }
    }

    async fn get_repositories(&self, owner: &str) -> Result<Vec<RepositoryRecord>, DbError> {
        Ok(self.owner_sorted(owner))
    }

    async fn upsert_repositories(
        &self,
        owner: &str,
        snapshots: Vec<RepositorySnapshot>,
        fetched_at: DateTime<Utc>,
    ) -> Result<Vec<RepositoryRecord>, DbError> {
        {
            let mut tables = self.tables.write();
            let by_id = tables.repositories.entry(owner.to_string()).or_default();
            for snapshot in snapshots {
                match by_id.get_mut(&snapshot.external_id) {
                    Some(existing) => {
                        existing.absorb(snapshot, fetched_at);
                    }
                    None => {
                        by_id.insert(
                            snapshot.external_id,
                            RepositoryRecord::from_snapshot(owner, snapshot, fetched_at),
                        );
                    }
                }
            }
        }
        Ok(self.owner_sorted(owner))
    }

    async fn list_by_owner(
        &self,
        owner: &str,
        page: u32,
        size: u32,
    ) -> Result<Page<RepositoryRecord>, DbError> {
        let (page, size) = clamp_page(page, size);
        let all = self.owner_sorted(owner);
        let total = all.len() as u64;
        let offset = (page as usize - 1).saturating_mul(size as usize);
        let items = all.into_iter().skip(offset).take(size as usize).collect();
        Ok(Page::new(items, total, page, size))
    }

    async fn list_featured(&self) -> Result<Vec<RepositoryRecord>, DbError> {
        let tables = self.tables.read();
        let mut featured: Vec<_> = tables
            .repositories
            .values()
            .flat_map(BTreeMap::values)
            .filter(|r| r.featured)
            .cloned()
            .collect();
        featured.sort_by(by_display_order);
        Ok(featured)
    }

    async fn set_featured(
        &self,
        owner: &str,
        external_id: i64,
        featured: bool,
        display_order: Option<i32>,
    ) -> Result<RepositoryRecord, DbError> {
        let mut tables = self.tables.write();
        let record = tables
            .repositories
            .get_mut(owner)
            .and_then(|by_id| by_id.get_mut(&external_id))
            .ok_or(DbError::NotFound)?;
        record.featured = featured;
        record.display_order = display_order;
        Ok(record.clone())
    }

    async fn health_check(&self) -> Result<(), DbError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
