//! The fit boundary: cache consult, credit debit, pure computation, cache
//! write — in that order. Cache hits are free; a stale or bypassed cache
//! entry costs one `fit_analysis` credit before anything is computed.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::credits::ledger;
use crate::errors::AppError;
use crate::fit::{cache, computer};
use crate::models::credits::CREDIT_TYPE_FIT_ANALYSIS;
use crate::models::fit::FitResult;
use crate::profile::fingerprint::profile_fingerprint;
use crate::profile::store as profile_store;
use crate::state::AppState;
use crate::universities;

#[derive(Deserialize)]
pub struct FitQuery {
    pub user_id: String,
    /// Overrides the profile's intended major for this computation.
    pub intended_major: Option<String>,
    /// Bypasses the cache and recomputes (still debits a credit).
    #[serde(default)]
    pub force: bool,
}

#[derive(Serialize)]
pub struct FitResponse {
    #[serde(flatten)]
    pub result: FitResult,
    pub from_cache: bool,
}

/// GET /api/v1/fit/:university_id
pub async fn handle_get_fit(
    State(state): State<AppState>,
    Path(university_id): Path<String>,
    Query(params): Query<FitQuery>,
) -> Result<Json<FitResponse>, AppError> {
    let profile = profile_store::get(&state.db, &params.user_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(
                "No profile exists for this user yet — upload a document or complete onboarding first"
                    .to_string(),
            )
        })?;

    let university = universities::get(&state.db, &university_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Unknown university '{university_id}'")))?;

    let fingerprint = profile_fingerprint(&profile);

    if !params.force {
        if let Some(cached) =
            cache::get(&state.db, &params.user_id, &university.university_id).await?
        {
            if cached.profile_version_hash == fingerprint {
                return Ok(Json(FitResponse {
                    result: cached,
                    from_cache: true,
                }));
            }
        }
    }

    // Fails closed before the computation runs; surfaces the remaining
    // balance to the caller.
    ledger::debit(
        &state.db,
        &params.user_id,
        CREDIT_TYPE_FIT_ANALYSIS,
        1,
        &format!("fit:{}", university.university_id),
    )
    .await?;

    let intended_major = params
        .intended_major
        .or_else(|| profile.intended_major.clone())
        .unwrap_or_default();
    let assessment = computer::compute_fit(&profile, &university, &intended_major);

    let result = FitResult::from_assessment(
        params.user_id.as_str(),
        university.university_id.as_str(),
        assessment,
        fingerprint,
    );
    cache::put(&state.db, &result).await?;

    Ok(Json(FitResponse {
        result,
        from_cache: false,
    }))
}
