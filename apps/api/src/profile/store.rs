//! Profile persistence. One row per user; merges run inside a transaction
//! with a row lock so concurrent uploads for the same user serialize.
//! A markdown snapshot of the merged profile is uploaded to S3 after the
//! transaction commits — the row lock is never held across the network call.

use anyhow::anyhow;
use aws_sdk_s3::primitives::ByteStream;
use chrono::Utc;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::profile::{
    ExtractedFields, MergeResult, OnboardingFields, RemovalResult, StudentProfile,
};
use crate::profile::merge;

pub async fn get(pool: &PgPool, user_id: &str) -> Result<Option<StudentProfile>, AppError> {
    let row: Option<(serde_json::Value,)> =
        sqlx::query_as("SELECT data FROM student_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    row.map(|(data,)| {
        serde_json::from_value(data)
            .map_err(|e| AppError::Internal(anyhow!("corrupt profile record for {user_id}: {e}")))
    })
    .transpose()
}

/// Merges one upload into the user's profile, creating it on first upload.
pub async fn upsert_from_upload(
    pool: &PgPool,
    s3: &aws_sdk_s3::Client,
    s3_bucket: &str,
    user_id: &str,
    filename: &str,
    fields: &ExtractedFields,
    raw_text: &str,
) -> Result<MergeResult, AppError> {
    let (profile, result) = mutate(pool, user_id, |profile| {
        merge::apply_upload(profile, filename, fields, raw_text)
    })
    .await?;

    info!(
        "Merged upload '{filename}' into profile {user_id} v{} ({} fields changed)",
        result.version,
        result.changed_fields.len()
    );

    upload_snapshot(s3, s3_bucket, &profile).await;
    Ok(result)
}

/// Applies onboarding-form scalars, creating the profile if needed.
/// No file source is recorded for these fields.
pub async fn apply_onboarding(
    pool: &PgPool,
    user_id: &str,
    fields: &OnboardingFields,
) -> Result<MergeResult, AppError> {
    let (_, result) = mutate(pool, user_id, |profile| {
        merge::apply_onboarding(profile, fields)
    })
    .await?;
    Ok(result)
}

/// Rolls back fields whose only source was the deleted document.
pub async fn remove_source_fields(
    pool: &PgPool,
    user_id: &str,
    filename: &str,
) -> Result<RemovalResult, AppError> {
    let mut tx = pool.begin().await?;

    let existing: Option<(serde_json::Value, i32)> = sqlx::query_as(
        "SELECT data, version FROM student_profiles WHERE user_id = $1 FOR UPDATE",
    )
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((data, _)) = existing else {
        return Err(AppError::NotFound(format!(
            "No profile exists for {user_id}"
        )));
    };

    let mut profile: StudentProfile = serde_json::from_value(data)
        .map_err(|e| AppError::Internal(anyhow!("corrupt profile record for {user_id}: {e}")))?;

    let result = merge::remove_source(&mut profile, filename);
    profile.version += 1;
    profile.updated_at = Utc::now();
    write_profile(&mut tx, &profile).await?;
    tx.commit().await?;

    info!(
        "Removed source '{filename}' from profile {user_id}: {} cleared, {} retained",
        result.cleared_fields.len(),
        result.retained_fields.len()
    );
    Ok(result)
}

/// Read-modify-write under a row lock, creating the profile on first write.
async fn mutate<F>(
    pool: &PgPool,
    user_id: &str,
    apply: F,
) -> Result<(StudentProfile, MergeResult), AppError>
where
    F: FnOnce(&mut StudentProfile) -> Vec<String>,
{
    let mut tx = pool.begin().await?;

    let existing: Option<(serde_json::Value,)> =
        sqlx::query_as("SELECT data FROM student_profiles WHERE user_id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

    let created = existing.is_none();
    let mut profile = match existing {
        Some((data,)) => serde_json::from_value(data)
            .map_err(|e| AppError::Internal(anyhow!("corrupt profile record for {user_id}: {e}")))?,
        None => StudentProfile::new(user_id),
    };

    let changed_fields = apply(&mut profile);
    profile.version += 1;
    profile.updated_at = Utc::now();
    write_profile(&mut tx, &profile).await?;
    tx.commit().await?;

    let version = profile.version;
    Ok((
        profile,
        MergeResult {
            created,
            changed_fields,
            version,
        },
    ))
}

async fn write_profile(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    profile: &StudentProfile,
) -> Result<(), AppError> {
    let data = serde_json::to_value(profile)
        .map_err(|e| AppError::Internal(anyhow!("profile serialization: {e}")))?;

    sqlx::query(
        r#"
        INSERT INTO student_profiles (user_id, data, version, updated_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id)
        DO UPDATE SET data = EXCLUDED.data,
                      version = EXCLUDED.version,
                      updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(&profile.user_id)
    .bind(data)
    .bind(profile.version)
    .bind(profile.updated_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Uploads a rendered snapshot to `profiles/{user_id}/v{n}.md`. The merge is
/// already committed, so a storage failure is logged rather than surfaced.
async fn upload_snapshot(s3: &aws_sdk_s3::Client, s3_bucket: &str, profile: &StudentProfile) {
    let s3_key = format!("profiles/{}/v{}.md", profile.user_id, profile.version);
    let md_content = render_profile_to_md(profile);

    match s3
        .put_object()
        .bucket(s3_bucket)
        .key(&s3_key)
        .body(ByteStream::from(md_content.into_bytes()))
        .content_type("text/markdown")
        .send()
        .await
    {
        Ok(_) => info!("Uploaded profile snapshot to s3://{s3_bucket}/{s3_key}"),
        Err(e) => warn!("Profile snapshot upload failed for {s3_key}: {e}"),
    }
}

/// Renders the merged profile as a structured markdown document.
pub fn render_profile_to_md(profile: &StudentProfile) -> String {
    let mut md = format!("# Profile Snapshot — {}\n\n", profile.user_id);
    md.push_str(&format!("- **Version:** {}\n\n", profile.version));

    md.push_str("## Academics\n\n");
    push_scalar(&mut md, "Weighted GPA", &profile.gpa_weighted);
    push_scalar(&mut md, "Unweighted GPA", &profile.gpa_unweighted);
    push_scalar(&mut md, "SAT", &profile.sat_total);
    push_scalar(&mut md, "ACT", &profile.act_composite);
    push_scalar(&mut md, "Class rank", &profile.class_rank);
    push_scalar(&mut md, "Intended major", &profile.intended_major);
    push_scalar(&mut md, "Graduation year", &profile.graduation_year);
    push_scalar(&mut md, "School", &profile.school);
    push_scalar(&mut md, "Location", &profile.location);
    md.push('\n');

    if !profile.courses.is_empty() {
        md.push_str("## Courses\n\n");
        for c in &profile.courses {
            md.push_str(&format!(
                "- {}{}\n",
                c.name,
                c.grade.as_deref().map(|g| format!(" ({g})")).unwrap_or_default()
            ));
        }
        md.push('\n');
    }
    if !profile.ap_exams.is_empty() {
        md.push_str("## AP Exams\n\n");
        for e in &profile.ap_exams {
            match e.score {
                Some(score) => md.push_str(&format!("- {}: {}\n", e.subject, score)),
                None => md.push_str(&format!("- {}\n", e.subject)),
            }
        }
        md.push('\n');
    }
    if !profile.extracurriculars.is_empty() {
        md.push_str("## Extracurriculars\n\n");
        for a in &profile.extracurriculars {
            md.push_str(&format!("- {}\n", a.name));
        }
        md.push('\n');
    }
    if !profile.leadership_roles.is_empty() {
        md.push_str("## Leadership\n\n");
        for a in &profile.leadership_roles {
            md.push_str(&format!("- {}\n", a.name));
        }
        md.push('\n');
    }
    if !profile.awards.is_empty() {
        md.push_str("## Awards\n\n");
        for a in &profile.awards {
            md.push_str(&format!("- {}\n", a.name));
        }
        md.push('\n');
    }
    if !profile.work_experience.is_empty() {
        md.push_str("## Work Experience\n\n");
        for w in &profile.work_experience {
            md.push_str(&format!("- {}\n", w.employer));
        }
        md.push('\n');
    }

    if !profile.field_sources.is_empty() {
        md.push_str("## Sources\n\n");
        for (field, sources) in &profile.field_sources {
            let list: Vec<&str> = sources.iter().map(String::as_str).collect();
            md.push_str(&format!("- {}: {}\n", field, list.join(", ")));
        }
    }

    md
}

fn push_scalar<T: std::fmt::Display>(md: &mut String, label: &str, value: &Option<T>) {
    if let Some(v) = value {
        md.push_str(&format!("- **{label}:** {v}\n"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_skips_empty_sections() {
        let mut profile = StudentProfile::new("a@example.com");
        profile.gpa_unweighted = Some(3.9);

        let md = render_profile_to_md(&profile);

        assert!(md.contains("**Unweighted GPA:** 3.9"));
        assert!(!md.contains("## Courses"));
        assert!(!md.contains("## Sources"));
    }
}
