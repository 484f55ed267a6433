//! Per-user ordered college list. Keyed (user_id, university_id); adding an
//! existing entry updates it in place, removal is a hard delete.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::college_list::CollegeListItem;
use crate::state::AppState;
use crate::universities;

pub async fn list(pool: &PgPool, user_id: &str) -> Result<Vec<CollegeListItem>, AppError> {
    Ok(sqlx::query_as(
        r#"
        SELECT * FROM college_list_items
        WHERE user_id = $1
        ORDER BY display_order, added_at
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

/// Appends at the end of the list, or updates status/major in place when
/// the university is already listed.
pub async fn add(
    pool: &PgPool,
    user_id: &str,
    university_id: &str,
    status: &str,
    intended_major: Option<&str>,
) -> Result<CollegeListItem, AppError> {
    Ok(sqlx::query_as(
        r#"
        INSERT INTO college_list_items
            (user_id, university_id, status, intended_major, display_order, added_at)
        VALUES ($1, $2, $3, $4,
                (SELECT COALESCE(MAX(display_order) + 1, 0)
                 FROM college_list_items WHERE user_id = $1),
                now())
        ON CONFLICT (user_id, university_id)
        DO UPDATE SET status = EXCLUDED.status,
                      intended_major = EXCLUDED.intended_major
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(university_id)
    .bind(status)
    .bind(intended_major)
    .fetch_one(pool)
    .await?)
}

pub async fn remove(pool: &PgPool, user_id: &str, university_id: &str) -> Result<bool, AppError> {
    let result = sqlx::query(
        "DELETE FROM college_list_items WHERE user_id = $1 AND university_id = $2",
    )
    .bind(user_id)
    .bind(university_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Rewrites display_order to match the given sequence. Ids missing from the
/// sequence keep their records but sort after the reordered ones.
pub async fn reorder(
    pool: &PgPool,
    user_id: &str,
    ordered_ids: &[String],
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    for (index, university_id) in ordered_ids.iter().enumerate() {
        sqlx::query(
            "UPDATE college_list_items SET display_order = $3 WHERE user_id = $1 AND university_id = $2",
        )
        .bind(user_id)
        .bind(universities::normalize_university_id(university_id))
        .bind(index as i32)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

// ---- handlers ----

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: String,
}

#[derive(Serialize)]
pub struct ListResponse {
    pub items: Vec<CollegeListItem>,
}

/// GET /api/v1/colleges — absent list is an empty list, not an error.
pub async fn handle_list(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<ListResponse>, AppError> {
    let items = list(&state.db, &params.user_id).await?;
    Ok(Json(ListResponse { items }))
}

#[derive(Deserialize)]
pub struct AddRequest {
    pub user_id: String,
    pub university_id: String,
    #[serde(default = "default_status")]
    pub status: String,
    pub intended_major: Option<String>,
}

fn default_status() -> String {
    "favorites".to_string()
}

/// POST /api/v1/colleges
pub async fn handle_add(
    State(state): State<AppState>,
    Json(req): Json<AddRequest>,
) -> Result<Json<CollegeListItem>, AppError> {
    // Resolve through the KB so the stored id is the canonical slug.
    let university = universities::get(&state.db, &req.university_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Unknown university '{}'", req.university_id))
        })?;

    let item = add(
        &state.db,
        &req.user_id,
        &university.university_id,
        &req.status,
        req.intended_major.as_deref(),
    )
    .await?;
    Ok(Json(item))
}

/// DELETE /api/v1/colleges/:university_id
pub async fn handle_remove(
    State(state): State<AppState>,
    Path(university_id): Path<String>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    let id = universities::normalize_university_id(&university_id);
    let removed = remove(&state.db, &params.user_id, &id).await?;
    if !removed {
        return Err(AppError::NotFound(format!(
            "'{id}' is not on this user's list"
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ReorderRequest {
    pub user_id: String,
    pub ordered_ids: Vec<String>,
}

/// PATCH /api/v1/colleges/reorder
pub async fn handle_reorder(
    State(state): State<AppState>,
    Json(req): Json<ReorderRequest>,
) -> Result<StatusCode, AppError> {
    reorder(&state.db, &req.user_id, &req.ordered_ids).await?;
    Ok(StatusCode::NO_CONTENT)
}
