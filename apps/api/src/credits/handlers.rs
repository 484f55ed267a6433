use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credits::ledger;
use crate::errors::AppError;
use crate::models::credits::{CreditBalance, CreditUsageRecord};
use crate::state::AppState;

const USAGE_HISTORY_LIMIT: i64 = 20;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: String,
}

#[derive(Serialize)]
pub struct BalancesResponse {
    pub balances: Vec<CreditBalance>,
    pub recent_usage: Vec<CreditUsageRecord>,
}

/// GET /api/v1/credits
pub async fn handle_get_balances(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<BalancesResponse>, AppError> {
    let balances = ledger::balances(&state.db, &params.user_id).await?;
    let recent_usage =
        ledger::usage_history(&state.db, &params.user_id, USAGE_HISTORY_LIMIT).await?;
    Ok(Json(BalancesResponse {
        balances,
        recent_usage,
    }))
}

#[derive(Deserialize)]
pub struct GrantRequest {
    pub user_id: String,
    pub credit_type: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub source: Option<String>,
    /// When present, opens an unlimited window instead of granting units.
    #[serde(default)]
    pub unlimited_until: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct GrantResponse {
    pub credit_type: String,
    pub balance: i64,
    pub unlimited_until: Option<DateTime<Utc>>,
}

/// POST /api/v1/credits/grant
pub async fn handle_grant(
    State(state): State<AppState>,
    Json(req): Json<GrantRequest>,
) -> Result<Json<GrantResponse>, AppError> {
    if req.credit_type.trim().is_empty() {
        return Err(AppError::Validation("credit_type is required".to_string()));
    }

    if let Some(until) = req.unlimited_until {
        ledger::set_unlimited(&state.db, &req.user_id, &req.credit_type, until).await?;
        let availability =
            ledger::check_available(&state.db, &req.user_id, &req.credit_type, 0).await?;
        return Ok(Json(GrantResponse {
            credit_type: req.credit_type,
            balance: availability.remaining,
            unlimited_until: Some(until),
        }));
    }

    let source = req.source.as_deref().unwrap_or("manual_grant");
    let balance = ledger::grant(
        &state.db,
        &req.user_id,
        &req.credit_type,
        req.amount,
        source,
    )
    .await?;
    Ok(Json(GrantResponse {
        credit_type: req.credit_type,
        balance,
        unlimited_until: None,
    }))
}
