use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::fit::cache;
use crate::models::profile::{ExtractedFields, OnboardingFields, StudentProfile};
use crate::profile::store;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: String,
}

/// Payload delivered by the document-ingestion boundary: fields already
/// extracted from the uploaded file, plus its raw text. The core never
/// parses PDFs/DOCX itself.
#[derive(Deserialize)]
pub struct UploadRequest {
    pub user_id: String,
    pub filename: String,
    #[serde(default)]
    pub extracted_fields: ExtractedFields,
    #[serde(default)]
    pub raw_text: String,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub created: bool,
    pub changed_fields: Vec<String>,
    pub version: i32,
    pub fit_cache_invalidated: bool,
}

/// POST /api/v1/profile/uploads
pub async fn handle_upload(
    State(state): State<AppState>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, AppError> {
    if req.filename.trim().is_empty() {
        return Err(AppError::Validation("filename is required".to_string()));
    }

    let merge = store::upsert_from_upload(
        &state.db,
        &state.s3,
        &state.config.s3_bucket,
        &req.user_id,
        &req.filename,
        &req.extracted_fields,
        &req.raw_text,
    )
    .await?;

    let invalidated =
        cache::invalidate_if_relevant(&state.db, &req.user_id, &merge.changed_fields).await?;

    Ok(Json(UploadResponse {
        created: merge.created,
        changed_fields: merge.changed_fields,
        version: merge.version,
        fit_cache_invalidated: invalidated,
    }))
}

#[derive(Serialize)]
pub struct RemovalResponse {
    pub cleared_fields: Vec<String>,
    pub retained_fields: Vec<String>,
    pub fit_cache_invalidated: bool,
}

/// DELETE /api/v1/profile/uploads/:filename
pub async fn handle_remove_upload(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<RemovalResponse>, AppError> {
    let removal = store::remove_source_fields(&state.db, &params.user_id, &filename).await?;

    // Cleared fields lost their value, which is a content change like any
    // other; retained fields kept theirs and don't count.
    let invalidated =
        cache::invalidate_if_relevant(&state.db, &params.user_id, &removal.cleared_fields).await?;

    Ok(Json(RemovalResponse {
        cleared_fields: removal.cleared_fields,
        retained_fields: removal.retained_fields,
        fit_cache_invalidated: invalidated,
    }))
}

#[derive(Deserialize)]
pub struct OnboardingRequest {
    pub user_id: String,
    #[serde(flatten)]
    pub fields: OnboardingFields,
}

#[derive(Serialize)]
pub struct OnboardingResponse {
    pub created: bool,
    pub changed_fields: Vec<String>,
    pub version: i32,
    pub fit_cache_invalidated: bool,
}

/// POST /api/v1/profile/onboarding
pub async fn handle_onboarding(
    State(state): State<AppState>,
    Json(req): Json<OnboardingRequest>,
) -> Result<Json<OnboardingResponse>, AppError> {
    let merge = store::apply_onboarding(&state.db, &req.user_id, &req.fields).await?;
    let invalidated =
        cache::invalidate_if_relevant(&state.db, &req.user_id, &merge.changed_fields).await?;

    Ok(Json(OnboardingResponse {
        created: merge.created,
        changed_fields: merge.changed_fields,
        version: merge.version,
        fit_cache_invalidated: invalidated,
    }))
}

/// GET /api/v1/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<StudentProfile>, AppError> {
    let profile = store::get(&state.db, &params.user_id).await?.ok_or_else(|| {
        AppError::NotFound(
            "No profile exists for this user yet — upload a document or complete onboarding first"
                .to_string(),
        )
    })?;
    Ok(Json(profile))
}
