//! Pure merge semantics for the student profile.
//!
//! Scalars are last-write-wins per field; collections append new items keyed
//! case-insensitively by their natural key and never remove existing ones.
//! `field_sources` tracks which uploads contributed to each field, driving
//! rollback when a source document is deleted.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::models::profile::{
    ExtractedFields, NaturalKey, OnboardingFields, RemovalResult, StudentProfile,
};

const BLOCK_HEADER_PREFIX: &str = "===== ";
const BLOCK_HEADER_SUFFIX: &str = " =====\n";
const BLOCK_SEPARATOR: &str = "\n\n";

/// Merges one upload's extracted fields into the profile.
/// Returns the fields whose value actually changed (the fit-cache
/// invalidation input). Source bookkeeping is updated for every field the
/// upload contributed to, changed or not.
pub fn apply_upload(
    profile: &mut StudentProfile,
    filename: &str,
    fields: &ExtractedFields,
    raw_text: &str,
) -> Vec<String> {
    let mut changed = Vec::new();

    merge_scalar(
        &mut profile.gpa_weighted,
        &fields.gpa_weighted,
        "gpa_weighted",
        Some((filename, &mut profile.field_sources)),
        &mut changed,
    );
    merge_scalar(
        &mut profile.gpa_unweighted,
        &fields.gpa_unweighted,
        "gpa_unweighted",
        Some((filename, &mut profile.field_sources)),
        &mut changed,
    );
    merge_scalar(
        &mut profile.sat_total,
        &fields.sat_total,
        "sat_total",
        Some((filename, &mut profile.field_sources)),
        &mut changed,
    );
    merge_scalar(
        &mut profile.act_composite,
        &fields.act_composite,
        "act_composite",
        Some((filename, &mut profile.field_sources)),
        &mut changed,
    );
    merge_scalar(
        &mut profile.class_rank,
        &fields.class_rank,
        "class_rank",
        Some((filename, &mut profile.field_sources)),
        &mut changed,
    );
    merge_scalar(
        &mut profile.intended_major,
        &fields.intended_major,
        "intended_major",
        Some((filename, &mut profile.field_sources)),
        &mut changed,
    );
    merge_scalar(
        &mut profile.graduation_year,
        &fields.graduation_year,
        "graduation_year",
        Some((filename, &mut profile.field_sources)),
        &mut changed,
    );
    merge_scalar(
        &mut profile.school,
        &fields.school,
        "school",
        Some((filename, &mut profile.field_sources)),
        &mut changed,
    );
    merge_scalar(
        &mut profile.location,
        &fields.location,
        "location",
        Some((filename, &mut profile.field_sources)),
        &mut changed,
    );

    merge_collection(
        &mut profile.courses,
        &fields.courses,
        "courses",
        filename,
        &mut profile.field_sources,
        &mut changed,
    );
    merge_collection(
        &mut profile.ap_exams,
        &fields.ap_exams,
        "ap_exams",
        filename,
        &mut profile.field_sources,
        &mut changed,
    );
    merge_collection(
        &mut profile.extracurriculars,
        &fields.extracurriculars,
        "extracurriculars",
        filename,
        &mut profile.field_sources,
        &mut changed,
    );
    merge_collection(
        &mut profile.leadership_roles,
        &fields.leadership_roles,
        "leadership_roles",
        filename,
        &mut profile.field_sources,
        &mut changed,
    );
    merge_collection(
        &mut profile.awards,
        &fields.awards,
        "awards",
        filename,
        &mut profile.field_sources,
        &mut changed,
    );
    merge_collection(
        &mut profile.work_experience,
        &fields.work_experience,
        "work_experience",
        filename,
        &mut profile.field_sources,
        &mut changed,
    );

    append_raw_content(&mut profile.raw_content, filename, raw_text);

    changed
}

/// Applies onboarding-form scalars. Last-write-wins like uploads, but no
/// file source is recorded.
pub fn apply_onboarding(profile: &mut StudentProfile, fields: &OnboardingFields) -> Vec<String> {
    let mut changed = Vec::new();

    merge_scalar(
        &mut profile.gpa_weighted,
        &fields.gpa_weighted,
        "gpa_weighted",
        None,
        &mut changed,
    );
    merge_scalar(
        &mut profile.gpa_unweighted,
        &fields.gpa_unweighted,
        "gpa_unweighted",
        None,
        &mut changed,
    );
    merge_scalar(
        &mut profile.sat_total,
        &fields.sat_total,
        "sat_total",
        None,
        &mut changed,
    );
    merge_scalar(
        &mut profile.act_composite,
        &fields.act_composite,
        "act_composite",
        None,
        &mut changed,
    );
    merge_scalar(
        &mut profile.class_rank,
        &fields.class_rank,
        "class_rank",
        None,
        &mut changed,
    );
    merge_scalar(
        &mut profile.intended_major,
        &fields.intended_major,
        "intended_major",
        None,
        &mut changed,
    );
    merge_scalar(
        &mut profile.graduation_year,
        &fields.graduation_year,
        "graduation_year",
        None,
        &mut changed,
    );
    merge_scalar(
        &mut profile.school,
        &fields.school,
        "school",
        None,
        &mut changed,
    );
    merge_scalar(
        &mut profile.location,
        &fields.location,
        "location",
        None,
        &mut changed,
    );

    changed
}

/// Rolls back fields contributed by a deleted source document.
///
/// Sole-source fields are nulled and their bookkeeping dropped; fields with
/// other remaining sources keep their current value and only lose the
/// filename from the set. Values are NOT recomputed from remaining sources
/// (per-item provenance is not tracked). The document's raw-text block is
/// stripped from `raw_content`.
pub fn remove_source(profile: &mut StudentProfile, filename: &str) -> RemovalResult {
    let mut cleared = Vec::new();
    let mut retained = Vec::new();

    let fields: Vec<String> = profile.field_sources.keys().cloned().collect();
    for field in fields {
        let Some(sources) = profile.field_sources.get_mut(&field) else {
            continue;
        };
        if !sources.contains(filename) {
            continue;
        }
        if sources.len() == 1 {
            profile.field_sources.remove(&field);
            clear_field(profile, &field);
            cleared.push(field);
        } else {
            sources.remove(filename);
            retained.push(field);
        }
    }

    profile.raw_content = strip_raw_blocks(&profile.raw_content, filename);

    RemovalResult {
        cleared_fields: cleared,
        retained_fields: retained,
    }
}

fn merge_scalar<T: PartialEq + Clone>(
    current: &mut Option<T>,
    incoming: &Option<T>,
    field: &'static str,
    source: Option<(&str, &mut BTreeMap<String, BTreeSet<String>>)>,
    changed: &mut Vec<String>,
) {
    let Some(value) = incoming else {
        // Null input never overwrites and never registers a source.
        return;
    };
    if current.as_ref() != Some(value) {
        changed.push(field.to_string());
    }
    *current = Some(value.clone());
    if let Some((filename, sources)) = source {
        sources
            .entry(field.to_string())
            .or_default()
            .insert(filename.to_string());
    }
}

fn merge_collection<T: NaturalKey + Clone>(
    current: &mut Vec<T>,
    incoming: &[T],
    field: &'static str,
    filename: &str,
    sources: &mut BTreeMap<String, BTreeSet<String>>,
    changed: &mut Vec<String>,
) {
    if incoming.is_empty() {
        return;
    }
    let mut appended = false;
    for item in incoming {
        let key = item.natural_key().to_lowercase();
        let exists = current
            .iter()
            .any(|existing| existing.natural_key().to_lowercase() == key);
        if !exists {
            current.push(item.clone());
            appended = true;
        }
    }
    // The upload contributed values even when every item was already
    // present, so it becomes a source either way; only an actual append
    // counts as a change.
    sources
        .entry(field.to_string())
        .or_default()
        .insert(filename.to_string());
    if appended {
        changed.push(field.to_string());
    }
}

fn clear_field(profile: &mut StudentProfile, field: &str) {
    match field {
        "gpa_weighted" => profile.gpa_weighted = None,
        "gpa_unweighted" => profile.gpa_unweighted = None,
        "sat_total" => profile.sat_total = None,
        "act_composite" => profile.act_composite = None,
        "class_rank" => profile.class_rank = None,
        "intended_major" => profile.intended_major = None,
        "graduation_year" => profile.graduation_year = None,
        "school" => profile.school = None,
        "location" => profile.location = None,
        "courses" => profile.courses.clear(),
        "ap_exams" => profile.ap_exams.clear(),
        "extracurriculars" => profile.extracurriculars.clear(),
        "leadership_roles" => profile.leadership_roles.clear(),
        "awards" => profile.awards.clear(),
        "work_experience" => profile.work_experience.clear(),
        other => {
            // Stale bookkeeping referencing an unknown field. Tolerated;
            // must not block profile reads or writes.
            warn!("field_sources references unknown field '{other}', skipping");
        }
    }
}

/// Appends one upload's raw text as a filename-headed block.
/// Never truncates, never deduplicates: re-uploading identical content
/// appends a second identical block.
pub fn append_raw_content(raw: &mut String, filename: &str, text: &str) {
    if !raw.is_empty() {
        raw.push_str(BLOCK_SEPARATOR);
    }
    raw.push_str(BLOCK_HEADER_PREFIX);
    raw.push_str(filename);
    raw.push_str(BLOCK_HEADER_SUFFIX);
    raw.push_str(text);
}

/// Splits `raw_content` back into (filename, text) blocks, in append order.
/// Text may itself contain blank lines, so blocks are delimited by header
/// occurrences rather than by the separator alone.
pub fn raw_blocks(raw: &str) -> Vec<(String, String)> {
    let starts = block_start_indices(raw);
    let mut blocks = Vec::new();
    for (i, &start) in starts.iter().enumerate() {
        let end = starts
            .get(i + 1)
            .map(|&next| next - BLOCK_SEPARATOR.len())
            .unwrap_or(raw.len());
        let rest = &raw[start + BLOCK_HEADER_PREFIX.len()..end];
        if let Some((filename, text)) = rest.split_once(BLOCK_HEADER_SUFFIX) {
            blocks.push((filename.to_string(), text.to_string()));
        }
    }
    blocks
}

fn block_start_indices(raw: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    if raw.starts_with(BLOCK_HEADER_PREFIX) {
        starts.push(0);
    }
    let marker = format!("{BLOCK_SEPARATOR}{BLOCK_HEADER_PREFIX}");
    let mut from = 0;
    while let Some(pos) = raw[from..].find(&marker) {
        starts.push(from + pos + BLOCK_SEPARATOR.len());
        from += pos + marker.len();
    }
    starts
}

/// Removes every block headed by `filename`, preserving the others in order.
pub fn strip_raw_blocks(raw: &str, filename: &str) -> String {
    let mut out = String::new();
    for (name, text) in raw_blocks(raw) {
        if name != filename {
            append_raw_content(&mut out, &name, &text);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::{Activity, ApExam, Course};

    fn upload_with_gpa(gpa: f64) -> ExtractedFields {
        ExtractedFields {
            gpa_unweighted: Some(gpa),
            ..Default::default()
        }
    }

    fn activity(name: &str) -> Activity {
        Activity {
            name: name.to_string(),
            role: None,
            description: None,
            years: None,
        }
    }

    #[test]
    fn test_scalar_last_write_wins() {
        let mut profile = StudentProfile::new("a@example.com");
        apply_upload(&mut profile, "transcript.pdf", &upload_with_gpa(3.5), "");
        let changed = apply_upload(&mut profile, "resume.pdf", &upload_with_gpa(3.8), "");

        assert_eq!(profile.gpa_unweighted, Some(3.8));
        assert_eq!(changed, vec!["gpa_unweighted"]);
        let sources = &profile.field_sources["gpa_unweighted"];
        assert!(sources.contains("transcript.pdf"));
        assert!(sources.contains("resume.pdf"));
    }

    #[test]
    fn test_null_input_does_not_overwrite_or_register_source() {
        let mut profile = StudentProfile::new("a@example.com");
        apply_upload(&mut profile, "transcript.pdf", &upload_with_gpa(3.5), "");
        let changed = apply_upload(&mut profile, "essay.docx", &ExtractedFields::default(), "");

        assert_eq!(profile.gpa_unweighted, Some(3.5));
        assert!(changed.is_empty());
        assert!(!profile.field_sources["gpa_unweighted"].contains("essay.docx"));
    }

    #[test]
    fn test_same_value_registers_source_without_change() {
        let mut profile = StudentProfile::new("a@example.com");
        apply_upload(&mut profile, "transcript.pdf", &upload_with_gpa(3.5), "");
        let changed = apply_upload(&mut profile, "resume.pdf", &upload_with_gpa(3.5), "");

        assert!(changed.is_empty());
        assert!(profile.field_sources["gpa_unweighted"].contains("resume.pdf"));
    }

    #[test]
    fn test_collection_dedup_by_natural_key_case_insensitive() {
        let mut profile = StudentProfile::new("a@example.com");
        let first = ExtractedFields {
            extracurriculars: vec![activity("Debate Team")],
            ..Default::default()
        };
        let second = ExtractedFields {
            extracurriculars: vec![activity("debate team"), activity("Robotics Club")],
            ..Default::default()
        };

        apply_upload(&mut profile, "resume1.pdf", &first, "");
        let changed = apply_upload(&mut profile, "resume2.pdf", &second, "");

        assert_eq!(profile.extracurriculars.len(), 2);
        assert_eq!(profile.extracurriculars[0].name, "Debate Team");
        assert_eq!(changed, vec!["extracurriculars"]);
    }

    #[test]
    fn test_merge_idempotence_same_fields_twice() {
        let mut profile = StudentProfile::new("a@example.com");
        let fields = ExtractedFields {
            gpa_unweighted: Some(3.9),
            extracurriculars: vec![activity("Debate Team")],
            ap_exams: vec![ApExam {
                subject: "Calculus BC".to_string(),
                score: Some(5),
            }],
            ..Default::default()
        };

        apply_upload(&mut profile, "resume.pdf", &fields, "text");
        let changed = apply_upload(&mut profile, "resume.pdf", &fields, "text");

        assert_eq!(profile.extracurriculars.len(), 1);
        assert_eq!(profile.ap_exams.len(), 1);
        assert_eq!(profile.gpa_unweighted, Some(3.9));
        assert!(changed.is_empty());
        // raw_content is explicitly NOT deduplicated.
        assert_eq!(profile.raw_content.matches("===== resume.pdf").count(), 2);
    }

    #[test]
    fn test_existing_items_never_removed_by_upload() {
        let mut profile = StudentProfile::new("a@example.com");
        let first = ExtractedFields {
            courses: vec![
                Course {
                    name: "AP Physics".to_string(),
                    grade: Some("A".to_string()),
                    level: None,
                },
                Course {
                    name: "AP Chemistry".to_string(),
                    grade: Some("A-".to_string()),
                    level: None,
                },
            ],
            ..Default::default()
        };
        let second = ExtractedFields {
            courses: vec![Course {
                name: "AP Physics".to_string(),
                grade: Some("B".to_string()),
                level: None,
            }],
            ..Default::default()
        };

        apply_upload(&mut profile, "t1.pdf", &first, "");
        apply_upload(&mut profile, "t2.pdf", &second, "");

        // Same key: the existing item wins, nothing is replaced or dropped.
        assert_eq!(profile.courses.len(), 2);
        assert_eq!(profile.courses[0].grade.as_deref(), Some("A"));
    }

    #[test]
    fn test_sole_source_removal_clears_exactly_that_field() {
        let mut profile = StudentProfile::new("a@example.com");
        let transcript = ExtractedFields {
            gpa_unweighted: Some(3.7),
            sat_total: Some(1450),
            ..Default::default()
        };
        let resume = ExtractedFields {
            sat_total: Some(1450),
            extracurriculars: vec![activity("Debate Team")],
            ..Default::default()
        };
        apply_upload(&mut profile, "transcript.pdf", &transcript, "gpa text");
        apply_upload(&mut profile, "resume.pdf", &resume, "resume text");

        let result = remove_source(&mut profile, "transcript.pdf");

        // gpa_unweighted was sourced only from the transcript.
        assert_eq!(result.cleared_fields, vec!["gpa_unweighted"]);
        assert_eq!(profile.gpa_unweighted, None);
        assert!(!profile.field_sources.contains_key("gpa_unweighted"));

        // sat_total had both documents as sources; value retained.
        assert_eq!(result.retained_fields, vec!["sat_total"]);
        assert_eq!(profile.sat_total, Some(1450));
        assert!(!profile.field_sources["sat_total"].contains("transcript.pdf"));

        // Unrelated fields untouched.
        assert_eq!(profile.extracurriculars.len(), 1);
    }

    #[test]
    fn test_removal_strips_raw_content_block() {
        let mut profile = StudentProfile::new("a@example.com");
        apply_upload(
            &mut profile,
            "transcript.pdf",
            &upload_with_gpa(3.7),
            "transcript body",
        );
        apply_upload(
            &mut profile,
            "resume.pdf",
            &ExtractedFields {
                extracurriculars: vec![activity("Chess Club")],
                ..Default::default()
            },
            "resume body",
        );

        remove_source(&mut profile, "transcript.pdf");

        assert!(!profile.raw_content.contains("transcript body"));
        assert!(profile.raw_content.contains("resume body"));
    }

    #[test]
    fn test_onboarding_sets_fields_without_sources() {
        let mut profile = StudentProfile::new("a@example.com");
        let fields = OnboardingFields {
            gpa_unweighted: Some(3.6),
            intended_major: Some("Biology".to_string()),
            ..Default::default()
        };

        let changed = apply_onboarding(&mut profile, &fields);

        assert_eq!(profile.gpa_unweighted, Some(3.6));
        assert_eq!(changed, vec!["gpa_unweighted", "intended_major"]);
        assert!(profile.field_sources.is_empty());
    }

    #[test]
    fn test_unknown_field_source_is_tolerated() {
        let mut profile = StudentProfile::new("a@example.com");
        profile
            .field_sources
            .entry("essay_topics".to_string())
            .or_default()
            .insert("old.pdf".to_string());

        let result = remove_source(&mut profile, "old.pdf");

        assert_eq!(result.cleared_fields, vec!["essay_topics"]);
    }

    #[test]
    fn test_strip_raw_blocks_keeps_other_blocks_in_order() {
        let mut raw = String::new();
        append_raw_content(&mut raw, "a.pdf", "alpha");
        append_raw_content(&mut raw, "b.pdf", "beta");
        append_raw_content(&mut raw, "a.pdf", "alpha again");

        let stripped = strip_raw_blocks(&raw, "a.pdf");

        assert!(!stripped.contains("alpha"));
        assert!(stripped.contains("beta"));
        assert!(stripped.starts_with("===== b.pdf"));
    }

    #[test]
    fn test_raw_blocks_preserve_multi_paragraph_text() {
        let mut raw = String::new();
        append_raw_content(&mut raw, "essay.docx", "first paragraph\n\nsecond paragraph");
        append_raw_content(&mut raw, "resume.pdf", "resume body");

        let blocks = raw_blocks(&raw);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].0, "essay.docx");
        assert_eq!(blocks[0].1, "first paragraph\n\nsecond paragraph");

        let stripped = strip_raw_blocks(&raw, "resume.pdf");
        assert!(stripped.contains("second paragraph"));
        assert!(!stripped.contains("resume body"));
    }
}
