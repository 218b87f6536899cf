//! Repository synchronization, listings and operator curation.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use folio_core::{normalize_key, Page, RepositoryRecord};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::github::RefreshQuery;
use super::{map_db_error, map_sync_error, ApiError, ApiResponse, AppState, ResponseMeta};

const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Serialize)]
pub(super) struct SyncedRepositories {
    pub owner: String,
    pub count: usize,
    pub repositories: Vec<RepositoryRecord>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PageQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(super) struct FeatureRequest {
    pub featured: bool,
    pub display_order: Option<i32>,
}

pub(super) async fn sync_repositories(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(username): Path<String>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<ApiResponse<SyncedRepositories>>, ApiError> {
    let synced = state
        .sync
        .sync_repositories(&username, query.force_refresh)
        .await
        .map_err(|e| map_sync_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: SyncedRepositories {
            owner: normalize_key(&username),
            count: synced.value.len(),
            repositories: synced.value,
        },
        meta: ResponseMeta::synced(req_id.0, synced.source),
    }))
}

pub(super) async fn list_featured(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<RepositoryRecord>>>, ApiError> {
    let data = state
        .sync
        .store()
        .list_featured()
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// Stored repositories only; never reaches upstream.
pub(super) async fn list_repositories(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(owner): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Page<RepositoryRecord>>>, ApiError> {
    let data = state
        .sync
        .store()
        .list_by_owner(
            &normalize_key(&owner),
            query.page.unwrap_or(1),
            query.size.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn set_feature(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((owner, repo_id)): Path<(String, i64)>,
    Json(body): Json<FeatureRequest>,
) -> Result<Json<ApiResponse<RepositoryRecord>>, ApiError> {
    if body.display_order.is_some_and(|order| order < 0) {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "display_order must not be negative",
        ));
    }

    let owner = normalize_key(&owner);
    let record = state
        .sync
        .store()
        .set_featured(&owner, repo_id, body.featured, body.display_order)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    tracing::info!(
        owner = %folio_core::sanitize_for_log(&owner),
        repo_id,
        featured = record.featured,
        display_order = record.display_order,
        "repository curation updated"
    );

    Ok(Json(ApiResponse {
        data: record,
        meta: ResponseMeta::new(req_id.0),
    }))
}
