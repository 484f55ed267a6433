//! Content fingerprint for staleness checks on cached fit results.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::models::profile::{
    Activity, ApExam, Award, Course, StudentProfile, WorkExperience,
};

/// The fields that constitute profile *content*. Bookkeeping
/// (`field_sources`, `raw_content`, `version`, timestamps) is excluded so a
/// source-set change without a value change does not look like new content.
#[derive(Serialize)]
struct FingerprintView<'a> {
    gpa_weighted: Option<f64>,
    gpa_unweighted: Option<f64>,
    sat_total: Option<i32>,
    act_composite: Option<i32>,
    class_rank: &'a Option<String>,
    intended_major: &'a Option<String>,
    graduation_year: Option<i32>,
    school: &'a Option<String>,
    location: &'a Option<String>,
    courses: &'a [Course],
    ap_exams: &'a [ApExam],
    extracurriculars: &'a [Activity],
    leadership_roles: &'a [Activity],
    awards: &'a [Award],
    work_experience: &'a [WorkExperience],
}

/// Hex sha256 over the canonical JSON of the profile's content fields.
pub fn profile_fingerprint(profile: &StudentProfile) -> String {
    let view = FingerprintView {
        gpa_weighted: profile.gpa_weighted,
        gpa_unweighted: profile.gpa_unweighted,
        sat_total: profile.sat_total,
        act_composite: profile.act_composite,
        class_rank: &profile.class_rank,
        intended_major: &profile.intended_major,
        graduation_year: profile.graduation_year,
        school: &profile.school,
        location: &profile.location,
        courses: &profile.courses,
        ap_exams: &profile.ap_exams,
        extracurriculars: &profile.extracurriculars,
        leadership_roles: &profile.leadership_roles,
        awards: &profile.awards,
        work_experience: &profile.work_experience,
    };
    // Field order is fixed by the struct, so the encoding is canonical.
    let bytes = serde_json::to_vec(&view).expect("fingerprint view serialization");
    let digest = Sha256::digest(&bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::ExtractedFields;
    use crate::profile::merge::apply_upload;

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = StudentProfile::new("a@example.com");
        let b = StudentProfile::new("a@example.com");
        assert_eq!(profile_fingerprint(&a), profile_fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let mut profile = StudentProfile::new("a@example.com");
        let before = profile_fingerprint(&profile);
        profile.gpa_unweighted = Some(3.9);
        assert_ne!(before, profile_fingerprint(&profile));
    }

    #[test]
    fn test_fingerprint_ignores_bookkeeping() {
        let mut profile = StudentProfile::new("a@example.com");
        profile.gpa_unweighted = Some(3.9);
        let before = profile_fingerprint(&profile);

        // A re-upload of the same value touches sources and raw_content only.
        let fields = ExtractedFields {
            gpa_unweighted: Some(3.9),
            ..Default::default()
        };
        apply_upload(&mut profile, "resume.pdf", &fields, "resume text");
        profile.version += 1;

        assert_eq!(before, profile_fingerprint(&profile));
    }
}
