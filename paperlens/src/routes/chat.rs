use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use std::sync::Arc;
use tracing::{error, info};

use crate::app::AppState;
use crate::error::ApiError;
use crate::models::api::{ChatRequest, ChatResponse};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/chat", post(chat))
}

/// POST /api/v1/chat - Ask a question about an uploaded paper.
async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if request.question.trim().is_empty() {
        return Err(ApiError::BadRequest("Question cannot be empty".to_string()));
    }
    if request.document_id.is_empty() {
        return Err(ApiError::BadRequest("Document ID is required".to_string()));
    }

    info!("Processing chat query for document {}", request.document_id);
    let history = request.chat_history.unwrap_or_default();
    let result = state
        .rag
        .query(
            &request.document_id,
            &request.question,
            request.explanation_level,
            &history,
        )
        .await
        .map_err(|e| {
            error!("Error processing chat query: {e}");
            ApiError::internal("Failed to process query", e)
        })?;

    Ok(Json(ChatResponse {
        answer: result.answer,
        sources: result.sources,
        document_id: request.document_id,
    }))
}
