use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, post};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::models::api::DocumentUploadResponse;
use crate::parser::chunk_document;
use crate::parser::pdf::ExtractionError;

/// Multipart framing allowance on top of the file size limit, so slightly
/// oversized files still reach the explicit size check.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Document upload and deletion routes.
pub fn routes(max_file_size: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/upload",
            post(upload_document).layer(DefaultBodyLimit::max(max_file_size + MULTIPART_OVERHEAD)),
        )
        .route("/documents/{document_id}", delete(delete_document))
}

/// POST /api/v1/upload - Extract, chunk and index a PDF.
async fn upload_document(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentUploadResponse>), ApiError> {
    let max_file_size = state.settings.max_file_size;
    let read_error = |e: MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            too_large(max_file_size)
        } else {
            ApiError::BadRequest(format!("Failed to read multipart field: {e}"))
        }
    };

    let mut upload: Option<(String, Bytes)> = None;
    while let Some(field) = multipart.next_field().await.map_err(read_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        if !is_pdf_filename(&filename) {
            return Err(ApiError::BadRequest("Only PDF files are supported".to_string()));
        }
        let data = field.bytes().await.map_err(read_error)?;
        upload = Some((filename, data));
        break;
    }

    let (filename, data) =
        upload.ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;
    if data.len() > max_file_size {
        return Err(too_large(max_file_size));
    }

    let document_id = Uuid::new_v4().to_string();
    info!("Processing PDF: {filename} (ID: {document_id})");

    let extracted = state.extractor.extract(&data).await.map_err(|e| match e {
        ExtractionError::Unreadable(_) => ApiError::BadRequest(e.to_string()),
        ExtractionError::Worker(_) => {
            error!("Error processing document {document_id}: {e}");
            ApiError::internal("Failed to process document", e)
        }
    })?;
    drop(data);

    if extracted.text.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Could not extract text from PDF. Please ensure the PDF contains readable text."
                .to_string(),
        ));
    }

    let chunks = chunk_document(
        &extracted.text,
        state.settings.chunk_size,
        state.settings.chunk_overlap,
    );
    if chunks.is_empty() {
        return Err(ApiError::BadRequest("Failed to chunk document text".to_string()));
    }

    let chunk_count = state
        .rag
        .add_document(&document_id, chunks)
        .await
        .map_err(|e| {
            error!("Error processing document {document_id}: {e}");
            ApiError::internal("Failed to process document", e)
        })?;

    info!(
        "Successfully processed document {document_id}: {} pages, {chunk_count} chunks",
        extracted.page_count
    );

    Ok((
        StatusCode::CREATED,
        Json(DocumentUploadResponse {
            document_id,
            filename,
            pages: extracted.page_count,
            chunks: chunk_count,
            message: "Document processed successfully".to_string(),
        }),
    ))
}

/// DELETE /api/v1/documents/{document_id}
async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = state.rag.delete_document(&document_id).await.map_err(|e| {
        error!("Error deleting document {document_id}: {e}");
        ApiError::internal("Failed to delete document", e)
    })?;

    if !deleted {
        return Err(ApiError::NotFound(format!("Document {document_id} not found")));
    }
    info!("Deleted document {document_id}");
    Ok(StatusCode::NO_CONTENT)
}

fn is_pdf_filename(filename: &str) -> bool {
    filename.to_ascii_lowercase().ends_with(".pdf")
}

fn too_large(max_file_size: usize) -> ApiError {
    ApiError::BadRequest(format!(
        "File size exceeds maximum allowed size of {:.1}MB",
        max_file_size as f64 / (1024.0 * 1024.0)
    ))
}
