//! Persisted fit results, one per (user, university), plus the invalidation
//! policy applied after every profile mutation.
//!
//! Invalidation is a fixed lookup table over field names, not inference:
//! a change to any fit-relevant field drops ALL cached fits for the user,
//! since those fields feed every university's computation identically.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::fit::{FitCategory, FitResult};

/// Profile fields whose change invalidates cached fits.
pub const FIT_RELEVANT_FIELDS: &[&str] = &[
    "gpa_weighted",
    "gpa_unweighted",
    "sat_total",
    "act_composite",
    "class_rank",
    "intended_major",
    "location",
];

/// Profile fields that never affect fit (descriptions, history, activity
/// lists). Every profile field must appear in exactly one of the two lists;
/// the policy test enforces it.
pub const NON_FIT_RELEVANT_FIELDS: &[&str] = &[
    "graduation_year",
    "school",
    "courses",
    "ap_exams",
    "extracurriculars",
    "leadership_roles",
    "awards",
    "work_experience",
];

pub fn should_invalidate(changed_fields: &[String]) -> bool {
    changed_fields
        .iter()
        .any(|f| FIT_RELEVANT_FIELDS.contains(&f.as_str()))
}

/// Applies the policy after a profile mutation; returns whether the user's
/// cached fits were dropped.
pub async fn invalidate_if_relevant(
    pool: &PgPool,
    user_id: &str,
    changed_fields: &[String],
) -> Result<bool, AppError> {
    if !should_invalidate(changed_fields) {
        return Ok(false);
    }
    let dropped = invalidate_user(pool, user_id).await?;
    info!("Invalidated {dropped} cached fit(s) for {user_id}");
    Ok(true)
}

#[derive(FromRow)]
struct FitResultRow {
    user_id: String,
    university_id: String,
    fit_category: Option<String>,
    match_score: i32,
    gap_analysis: Vec<String>,
    recommendations: Vec<String>,
    profile_version_hash: String,
    computed_at: DateTime<Utc>,
}

impl From<FitResultRow> for FitResult {
    fn from(row: FitResultRow) -> Self {
        let fit_category = row.fit_category.as_deref().and_then(|s| {
            let parsed = FitCategory::parse(s);
            if parsed.is_none() {
                // Tolerated: an unreadable category degrades to unknown.
                warn!("Unknown fit_category '{s}' in cache row, treating as unclassified");
            }
            parsed
        });
        FitResult {
            user_id: row.user_id,
            university_id: row.university_id,
            fit_category,
            match_score: row.match_score.clamp(0, 100) as u32,
            gap_analysis: row.gap_analysis,
            recommendations: row.recommendations,
            profile_version_hash: row.profile_version_hash,
            computed_at: row.computed_at,
        }
    }
}

pub async fn get(
    pool: &PgPool,
    user_id: &str,
    university_id: &str,
) -> Result<Option<FitResult>, AppError> {
    let row: Option<FitResultRow> = sqlx::query_as(
        "SELECT * FROM fit_results WHERE user_id = $1 AND university_id = $2",
    )
    .bind(user_id)
    .bind(university_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(FitResult::from))
}

/// Overwrites unconditionally.
pub async fn put(pool: &PgPool, result: &FitResult) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO fit_results
            (user_id, university_id, fit_category, match_score,
             gap_analysis, recommendations, profile_version_hash, computed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (user_id, university_id)
        DO UPDATE SET fit_category = EXCLUDED.fit_category,
                      match_score = EXCLUDED.match_score,
                      gap_analysis = EXCLUDED.gap_analysis,
                      recommendations = EXCLUDED.recommendations,
                      profile_version_hash = EXCLUDED.profile_version_hash,
                      computed_at = EXCLUDED.computed_at
        "#,
    )
    .bind(&result.user_id)
    .bind(&result.university_id)
    .bind(result.fit_category.map(|c| c.as_str()))
    .bind(result.match_score as i32)
    .bind(&result.gap_analysis)
    .bind(&result.recommendations)
    .bind(&result.profile_version_hash)
    .bind(result.computed_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Drops every cached fit for the user. Returns the number removed.
pub async fn invalidate_user(pool: &PgPool, user_id: &str) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM fit_results WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::PROFILE_FIELDS;

    #[test]
    fn test_every_profile_field_is_classified_exactly_once() {
        for field in PROFILE_FIELDS {
            let relevant = FIT_RELEVANT_FIELDS.contains(field);
            let non_relevant = NON_FIT_RELEVANT_FIELDS.contains(field);
            assert!(
                relevant ^ non_relevant,
                "profile field '{field}' must appear in exactly one policy list"
            );
        }
        // And nothing stale points the other way.
        for field in FIT_RELEVANT_FIELDS.iter().chain(NON_FIT_RELEVANT_FIELDS) {
            assert!(
                PROFILE_FIELDS.contains(field),
                "policy lists reference unknown field '{field}'"
            );
        }
    }

    #[test]
    fn test_gpa_change_invalidates() {
        assert!(should_invalidate(&["gpa_unweighted".to_string()]));
    }

    #[test]
    fn test_activity_change_does_not_invalidate() {
        assert!(!should_invalidate(&[
            "extracurriculars".to_string(),
            "awards".to_string()
        ]));
    }

    #[test]
    fn test_mixed_change_invalidates() {
        assert!(should_invalidate(&[
            "extracurriculars".to_string(),
            "sat_total".to_string()
        ]));
    }

    #[test]
    fn test_no_change_does_not_invalidate() {
        assert!(!should_invalidate(&[]));
    }
}
