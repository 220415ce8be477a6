//! MSA bucket handlers

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};

use crate::AppState;
use msaboard_common::{
    errors::{AppError, Result},
    models::MsaBucketResponse,
    service::BucketQuery,
};

/// Group every document by MSA number
pub async fn msa_buckets(
    State(state): State<AppState>,
    query: std::result::Result<Query<BucketQuery>, QueryRejection>,
) -> Result<Json<MsaBucketResponse>> {
    let Query(query) =
        query.map_err(|e| AppError::invalid_field("expiring_within_days", e.body_text()))?;

    let response = state.service.msa_buckets(query).await?;
    Ok(Json(response))
}
