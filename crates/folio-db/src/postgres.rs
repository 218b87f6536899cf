//! PostgreSQL-backed [`EntityStore`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use folio_core::{ExternalProfile, Page, RepositoryRecord, RepositorySnapshot};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::store::{clamp_page, EntityStore};
use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `external_profiles` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ProfileRow {
    key: String,
    display_name: Option<String>,
    bio: Option<String>,
    followers: i64,
    following: i64,
    public_repos: i64,
    avatar_url: Option<String>,
    profile_url: Option<String>,
    company: Option<String>,
    location: Option<String>,
    blog: Option<String>,
    twitter_username: Option<String>,
    hireable: Option<bool>,
    last_fetched_at: DateTime<Utc>,
}

impl From<ProfileRow> for ExternalProfile {
    fn from(row: ProfileRow) -> Self {
        Self {
            key: row.key,
            display_name: row.display_name,
            bio: row.bio,
            followers: row.followers,
            following: row.following,
            public_repos: row.public_repos,
            avatar_url: row.avatar_url,
            profile_url: row.profile_url,
            company: row.company,
            location: row.location,
            blog: row.blog,
            twitter_username: row.twitter_username,
            hireable: row.hireable,
            last_fetched_at: row.last_fetched_at,
        }
    }
}

/// A row from the `repositories` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct RepositoryRow {
    owner_key: String,
    external_id: i64,
    name: String,
    full_name: String,
    description: Option<String>,
    html_url: Option<String>,
    language: Option<String>,
    languages: Json<BTreeMap<String, i64>>,
    topics: Vec<String>,
    stars: i64,
    forks: i64,
    pushed_at: Option<DateTime<Utc>>,
    featured: bool,
    display_order: Option<i32>,
    last_fetched_at: DateTime<Utc>,
}

impl From<RepositoryRow> for RepositoryRecord {
    fn from(row: RepositoryRow) -> Self {
        Self {
            owner_key: row.owner_key,
            snapshot: RepositorySnapshot {
                external_id: row.external_id,
                name: row.name,
                full_name: row.full_name,
                description: row.description,
                html_url: row.html_url,
                language: row.language,
                languages: row.languages.0,
                topics: row.topics,
                stars: row.stars,
                forks: row.forks,
                pushed_at: row.pushed_at,
            },
            featured: row.featured,
            display_order: row.display_order,
            last_fetched_at: row.last_fetched_at,
        }
    }
}

const PROFILE_COLUMNS: &str = "key, display_name, bio, followers, following, public_repos, \
     avatar_url, profile_url, company, location, blog, twitter_username, hireable, last_fetched_at";

const REPOSITORY_COLUMNS: &str = "owner_key, external_id, name, full_name, description, html_url, \
     language, languages, topics, stars, forks, pushed_at, featured, display_order, last_fetched_at";

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn get_profile(&self, key: &str) -> Result<Option<ExternalProfile>, DbError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM external_profiles WHERE key = $1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ExternalProfile::from))
    }

    async fn upsert_profile(&self, profile: ExternalProfile) -> Result<ExternalProfile, DbError> {
        // The conditional DO UPDATE returns no row when the stored profile is
        // newer; the stored row is then read back as the winner.
        let written = sqlx::query_as::<_, ProfileRow>(&format!(
            "INSERT INTO external_profiles ({PROFILE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             ON CONFLICT (key) DO UPDATE SET \
                 display_name = EXCLUDED.display_name, \
                 bio = EXCLUDED.bio, \
                 followers = EXCLUDED.followers, \
                 following = EXCLUDED.following, \
                 public_repos = EXCLUDED.public_repos, \
                 avatar_url = EXCLUDED.avatar_url, \
                 profile_url = EXCLUDED.profile_url, \
                 company = EXCLUDED.company, \
                 location = EXCLUDED.location, \
                 blog = EXCLUDED.blog, \
                 twitter_username = EXCLUDED.twitter_username, \
                 hireable = EXCLUDED.hireable, \
                 last_fetched_at = EXCLUDED.last_fetched_at, \
                 updated_at = NOW() \
             WHERE external_profiles.last_fetched_at <= EXCLUDED.last_fetched_at \
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(&profile.key)
        .bind(&profile.display_name)
        .bind(&profile.bio)
        .bind(profile.followers)
        .bind(profile.following)
        .bind(profile.public_repos)
        .bind(&profile.avatar_url)
        .bind(&profile.profile_url)
        .bind(&profile.company)
        .bind(&profile.location)
        .bind(&profile.blog)
        .bind(&profile.twitter_username)
        .bind(profile.hireable)
        .bind(profile.last_fetched_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = written {
            return Ok(row.into());
        }
        tracing::debug!("discarding profile write older than stored row");
        self.get_profile(&profile.key).await?.ok_or(DbError::NotFound)
    }

    async fn get_repositories(&self, owner: &str) -> Result<Vec<RepositoryRecord>, DbError> {
        let rows = sqlx::query_as::<_, RepositoryRow>(&format!(
            "SELECT {REPOSITORY_COLUMNS} FROM repositories \
             WHERE owner_key = $1 \
             ORDER BY stars DESC, name"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RepositoryRecord::from).collect())
    }

    async fn upsert_repositories(
        &self,
        owner: &str,
        snapshots: Vec<RepositorySnapshot>,
        fetched_at: DateTime<Utc>,
    ) -> Result<Vec<RepositoryRecord>, DbError> {
        let mut tx = self.pool.begin().await?;

        for snapshot in snapshots {
            // featured and display_order are absent from the update list so a
            // re-sync leaves curation untouched.
            sqlx::query(
                "INSERT INTO repositories \
                     (owner_key, external_id, name, full_name, description, html_url, language, \
                      languages, topics, stars, forks, pushed_at, last_fetched_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
                 ON CONFLICT (owner_key, external_id) DO UPDATE SET \
                     name = EXCLUDED.name, \
                     full_name = EXCLUDED.full_name, \
                     description = EXCLUDED.description, \
                     html_url = EXCLUDED.html_url, \
                     language = EXCLUDED.language, \
                     languages = EXCLUDED.languages, \
                     topics = EXCLUDED.topics, \
                     stars = EXCLUDED.stars, \
                     forks = EXCLUDED.forks, \
                     pushed_at = EXCLUDED.pushed_at, \
                     last_fetched_at = EXCLUDED.last_fetched_at, \
                     updated_at = NOW() \
                 WHERE repositories.last_fetched_at <= EXCLUDED.last_fetched_at",
            )
            .bind(owner)
            .bind(snapshot.external_id)
            .bind(&snapshot.name)
            .bind(&snapshot.full_name)
            .bind(&snapshot.description)
            .bind(&snapshot.html_url)
            .bind(&snapshot.language)
            .bind(Json(&snapshot.languages))
            .bind(&snapshot.topics)
            .bind(snapshot.stars)
            .bind(snapshot.forks)
            .bind(snapshot.pushed_at)
            .bind(fetched_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.get_repositories(owner).await
    }

    async fn list_by_owner(
        &self,
        owner: &str,
        page: u32,
        size: u32,
    ) -> Result<Page<RepositoryRecord>, DbError> {
        let (page, size) = clamp_page(page, size);

        let total: i64 =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM repositories WHERE owner_key = $1")
                .bind(owner)
                .fetch_one(&self.pool)
                .await?;

        let offset = i64::from(page - 1) * i64::from(size);
        let rows = sqlx::query_as::<_, RepositoryRow>(&format!(
            "SELECT {REPOSITORY_COLUMNS} FROM repositories \
             WHERE owner_key = $1 \
             ORDER BY stars DESC, name \
             LIMIT $2 OFFSET $3"
        ))
        .bind(owner)
        .bind(i64::from(size))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let items = rows.into_iter().map(RepositoryRecord::from).collect();
        Ok(Page::new(
            items,
            u64::try_from(total).unwrap_or(0),
            page,
            size,
        ))
    }

    async fn list_featured(&self) -> Result<Vec<RepositoryRecord>, DbError> {
        let rows = sqlx::query_as::<_, RepositoryRow>(&format!(
            "SELECT {REPOSITORY_COLUMNS} FROM repositories \
             WHERE featured = true \
             ORDER BY display_order ASC NULLS LAST, stars DESC, name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RepositoryRecord::from).collect())
    }

    async fn set_featured(
        &self,
        owner: &str,
        external_id: i64,
        featured: bool,
        display_order: Option<i32>,
    ) -> Result<RepositoryRecord, DbError> {
        let row = sqlx::query_as::<_, RepositoryRow>(&format!(
            "UPDATE repositories \
             SET featured = $3, display_order = $4, updated_at = NOW() \
             WHERE owner_key = $1 AND external_id = $2 \
             RETURNING {REPOSITORY_COLUMNS}"
        ))
        .bind(owner)
        .bind(external_id)
        .bind(featured)
        .bind(display_order)
        .fetch_optional(&self.pool)
        .await?;

        row.map(RepositoryRecord::from).ok_or(DbError::NotFound)
    }

    async fn health_check(&self) -> Result<(), DbError> {
        crate::ping(&self.pool).await?;
        Ok(())
    }
}
