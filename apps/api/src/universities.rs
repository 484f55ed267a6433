//! Read-mostly university knowledge base, externally populated.

use anyhow::anyhow;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::university::UniversityRecord;

/// Canonical form for university ids. Lookups arrive in several variants
/// ("Tech_State", "tech-state_slug", "TECH STATE"); all must resolve to the
/// same stable slug before matching.
pub fn normalize_university_id(raw: &str) -> String {
    let mut id = raw.trim().to_lowercase();
    if let Some(stripped) = id.strip_suffix("_slug") {
        id = stripped.to_string();
    }
    id.replace([' ', '_'], "-")
}

pub async fn get(pool: &PgPool, raw_id: &str) -> Result<Option<UniversityRecord>, AppError> {
    let id = normalize_university_id(raw_id);
    let row: Option<(serde_json::Value,)> =
        sqlx::query_as("SELECT data FROM universities WHERE university_id = $1")
            .bind(&id)
            .fetch_optional(pool)
            .await?;

    row.map(|(data,)| {
        serde_json::from_value(data)
            .map_err(|e| AppError::Internal(anyhow!("corrupt university record '{id}': {e}")))
    })
    .transpose()
}

/// Filtered candidate fetch for the in-memory search strategy. Records that
/// fail to deserialize are skipped rather than failing the whole set.
pub async fn list_candidates(
    pool: &PgPool,
    state: Option<&str>,
    school_type: Option<&str>,
) -> Result<Vec<UniversityRecord>, AppError> {
    let rows: Vec<(serde_json::Value,)> = sqlx::query_as(
        r#"
        SELECT data FROM universities
        WHERE ($1::text IS NULL OR state = $1)
          AND ($2::text IS NULL OR school_type = $2)
        ORDER BY university_id
        "#,
    )
    .bind(state)
    .bind(school_type)
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for (data,) in rows {
        match serde_json::from_value::<UniversityRecord>(data) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!("Skipping corrupt university record: {e}"),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercases_and_trims() {
        assert_eq!(normalize_university_id("  Tech-State "), "tech-state");
    }

    #[test]
    fn test_normalize_strips_slug_suffix() {
        assert_eq!(normalize_university_id("tech-state_slug"), "tech-state");
    }

    #[test]
    fn test_normalize_spaces_and_underscores() {
        assert_eq!(normalize_university_id("Tech State"), "tech-state");
        assert_eq!(normalize_university_id("tech_state"), "tech-state");
    }

    #[test]
    fn test_lookup_variants_converge() {
        let canonical = normalize_university_id("tech-state");
        for variant in ["Tech_State", "tech-state_slug", "TECH STATE", "tech-state"] {
            assert_eq!(normalize_university_id(variant), canonical);
        }
    }
}
