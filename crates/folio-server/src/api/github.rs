//! Profile synchronization and upstream quota.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use folio_core::ExternalProfile;
use folio_github::RateLimitStatus;
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_fetch_error, map_sync_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Default, Deserialize)]
pub(super) struct RefreshQuery {
    #[serde(default)]
    pub force_refresh: bool,
}

pub(super) async fn get_profile(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(username): Path<String>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<ApiResponse<ExternalProfile>>, ApiError> {
    let synced = state
        .sync
        .sync_profile(&username, query.force_refresh)
        .await
        .map_err(|e| map_sync_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: synced.value,
        meta: ResponseMeta::synced(req_id.0, synced.source),
    }))
}

pub(super) async fn get_rate_limit(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<RateLimitStatus>>, ApiError> {
    let status = state
        .sync
        .upstream()
        .rate_limit()
        .await
        .map_err(|e| map_fetch_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: status,
        meta: ResponseMeta::new(req_id.0),
    }))
}
