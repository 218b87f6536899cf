//! `POST /api/v1/chat`: one completion over a client-held conversation.

use axum::{extract::State, Extension, Json};
use folio_chat::{ChatReply, ChatTurn};
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_provider_error, ApiError, ApiResponse, AppState, ResponseMeta};

const MAX_MESSAGE_CHARS: usize = 10_000;

#[derive(Debug, Deserialize)]
pub(super) struct ChatRequest {
    pub message: String,
    /// Earlier turns, oldest first. Nothing is persisted server-side.
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    /// Provider identifier; the configured default when absent.
    pub provider: Option<String>,
}

pub(super) async fn complete_chat(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ApiResponse<ChatReply>>, ApiError> {
    let length = body.message.trim().chars().count();
    if length == 0 || length > MAX_MESSAGE_CHARS {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            format!("message must be between 1 and {MAX_MESSAGE_CHARS} characters"),
        ));
    }

    let mut turns = body.history;
    turns.push(ChatTurn::user(body.message));

    let reply = state
        .chat
        .complete(body.provider.as_deref(), &turns)
        .await
        .map_err(|e| map_provider_error(req_id.0.clone(), &e))?;

    tracing::info!(
        provider = %reply.provider,
        model = %folio_core::sanitize_for_log(&reply.model),
        tokens_used = reply.tokens_used,
        "chat completion served"
    );

    Ok(Json(ApiResponse {
        data: reply,
        meta: ResponseMeta::new(req_id.0),
    }))
}
