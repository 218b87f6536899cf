mod chat;
mod github;
mod repositories;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use folio_chat::{ProviderError, ProviderRegistry};
use folio_db::DbError;
use folio_sync::{FetchError, SyncEngine, SyncError, SyncSource};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::{
    enforce_rate_limit, request_id, require_operator, ClientLimiter, OperatorAuth, RequestId,
    RouteLimits,
};

#[derive(Clone)]
pub struct AppState {
    pub sync: Arc<SyncEngine>,
    pub chat: Arc<ProviderRegistry>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    /// Where synchronized data came from; absent for plain store reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncSource>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
            sync: None,
        }
    }

    pub(super) fn synced(request_id: String, source: SyncSource) -> Self {
        Self {
            sync: Some(source),
            ..Self::new(request_id)
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "validation_error" => StatusCode::BAD_REQUEST,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "upstream_rejected" => StatusCode::BAD_GATEWAY,
            "sync_failed" | "upstream_unavailable" | "provider_unavailable" => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_db_error(request_id: String, error: &DbError) -> ApiError {
    if matches!(error, DbError::NotFound) {
        return ApiError::new(request_id, "not_found", "record not found");
    }
    tracing::error!(error = %error, "entity store query failed");
    ApiError::new(request_id, "internal_error", "entity store query failed")
}

pub(super) fn map_sync_error(request_id: String, error: &SyncError) -> ApiError {
    match error {
        SyncError::InvalidEndpoint { reason } => {
            ApiError::new(request_id, "validation_error", format!("invalid username: {reason}"))
        }
        SyncError::SyncFailed {
            key,
            cause: FetchError::Rejected { status: 404 },
        } => ApiError::new(request_id, "not_found", format!("no upstream account named {key}")),
        SyncError::SyncFailed {
            cause: cause @ FetchError::Rejected { .. },
            ..
        } => ApiError::new(request_id, "upstream_rejected", cause.to_string()),
        SyncError::SyncFailed { .. } => ApiError::new(
            request_id,
            "sync_failed",
            "upstream data is unavailable and nothing is cached",
        ),
        SyncError::Store(e) => map_db_error(request_id, e),
    }
}

pub(super) fn map_fetch_error(request_id: String, error: &FetchError) -> ApiError {
    match error {
        FetchError::Rejected { .. } => {
            ApiError::new(request_id, "upstream_rejected", error.to_string())
        }
        FetchError::InvalidEndpoint { reason } => {
            ApiError::new(request_id, "validation_error", reason.clone())
        }
        FetchError::Misconfigured { .. } | FetchError::Store { .. } | FetchError::Aborted { .. } => {
            tracing::error!(error = %error, "upstream call failed");
            ApiError::new(request_id, "internal_error", "upstream call failed")
        }
        FetchError::Unavailable { .. } => {
            ApiError::new(request_id, "upstream_unavailable", error.to_string())
        }
    }
}

pub(super) fn map_provider_error(request_id: String, error: &ProviderError) -> ApiError {
    match error {
        ProviderError::Unavailable { .. } => {
            ApiError::new(request_id, "provider_unavailable", error.to_string())
        }
        ProviderError::UnknownProvider(_) | ProviderError::InvalidRequest { .. } => {
            ApiError::new(request_id, "validation_error", error.to_string())
        }
        ProviderError::Upstream { .. } | ProviderError::MalformedReply { .. } => {
            tracing::warn!(error = %error, "chat provider call failed");
            ApiError::new(request_id, "upstream_rejected", error.to_string())
        }
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn upstream_router(limiter: ClientLimiter) -> Router<AppState> {
    Router::new()
        .route("/api/v1/github/{username}", get(github::get_profile))
        .route("/api/v1/upstream/rate-limit", get(github::get_rate_limit))
        .route(
            "/api/v1/repositories/sync/{username}",
            post(repositories::sync_repositories),
        )
        .route("/api/v1/chat", post(chat::complete_chat))
        .layer(axum::middleware::from_fn_with_state(
            limiter,
            enforce_rate_limit,
        ))
}

fn store_router(limiter: ClientLimiter) -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/repositories/featured",
            get(repositories::list_featured),
        )
        .route(
            "/api/v1/repositories/{owner}",
            get(repositories::list_repositories),
        )
        .layer(axum::middleware::from_fn_with_state(
            limiter,
            enforce_rate_limit,
        ))
}

fn operator_router(auth: OperatorAuth, limiter: ClientLimiter) -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/repositories/{owner}/{repo_id}/feature",
            patch(repositories::set_feature),
        )
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    limiter,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(auth, require_operator)),
        )
}

pub fn build_app(state: AppState, auth: OperatorAuth, limits: RouteLimits) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .merge(upstream_router(limits.upstream))
        .merge(operator_router(auth, limits.store.clone()))
        .merge(store_router(limits.store))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match state.sync.store().health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: entity store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests;
