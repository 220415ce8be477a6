//! Document handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use msaboard_common::{
    errors::{AppError, Result},
    models::DocumentRecord,
};

/// Request to tag a document with an MSA number
#[derive(Debug, Deserialize, Validate)]
pub struct TagMsaRequest {
    #[validate(length(max = 200))]
    pub msa_number: String,
}

#[derive(Serialize)]
pub struct DocumentsResponse {
    pub documents: Vec<DocumentRecord>,
}

#[derive(Serialize)]
pub struct DocumentResponse {
    pub document: DocumentRecord,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// List every document known to the backend
pub async fn list_documents(State(state): State<AppState>) -> Result<Json<DocumentsResponse>> {
    let documents = state.service.list_documents().await?;
    Ok(Json(DocumentsResponse { documents }))
}

/// Get a document by ID
pub async fn get_document(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<DocumentResponse>> {
    let document = state.service.get_document(&document_id).await?;
    Ok(Json(DocumentResponse { document }))
}

/// Tag a document with an MSA number
pub async fn tag_document(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    request: std::result::Result<Json<TagMsaRequest>, JsonRejection>,
) -> Result<Json<DocumentResponse>> {
    let Json(request) = request.map_err(|e| AppError::Validation {
        message: e.body_text(),
        field: None,
    })?;

    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("msa_number".to_string()),
    })?;

    let document = state
        .service
        .tag_document(&document_id, &request.msa_number)
        .await?;

    Ok(Json(DocumentResponse { document }))
}

/// Delete a document
pub async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    state.service.delete_document(&document_id).await?;

    Ok(Json(MessageResponse {
        message: "Document deleted successfully".to_string(),
    }))
}
