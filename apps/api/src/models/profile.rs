use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Every merge-tracked profile field, in schema order.
/// The fit-cache invalidation policy table is tested exhaustively against
/// this list so a new field can never be silently left unclassified.
pub const PROFILE_FIELDS: &[&str] = &[
    "gpa_weighted",
    "gpa_unweighted",
    "sat_total",
    "act_composite",
    "class_rank",
    "intended_major",
    "graduation_year",
    "school",
    "location",
    "courses",
    "ap_exams",
    "extracurriculars",
    "leadership_roles",
    "awards",
    "work_experience",
];

/// Items in collection fields are deduplicated by this key, case-insensitively.
pub trait NaturalKey {
    fn natural_key(&self) -> &str;
}

/// One course line from a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub name: String,
    #[serde(default)]
    pub grade: Option<String>,
    /// "AP", "IB", "Honors", "Regular"...
    #[serde(default)]
    pub level: Option<String>,
}

impl NaturalKey for Course {
    fn natural_key(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApExam {
    pub subject: String,
    #[serde(default)]
    pub score: Option<i32>,
}

impl NaturalKey for ApExam {
    fn natural_key(&self) -> &str {
        &self.subject
    }
}

/// An extracurricular activity or leadership role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub years: Option<String>,
}

impl NaturalKey for Activity {
    fn natural_key(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Award {
    pub name: String,
    /// "school", "state", "national"...
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
}

impl NaturalKey for Award {
    fn natural_key(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkExperience {
    pub employer: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl NaturalKey for WorkExperience {
    fn natural_key(&self) -> &str {
        &self.employer
    }
}

/// One merged student profile per user. Built up by repeated document
/// uploads (merge, not replace) and by the onboarding form; fields are
/// rolled back when their sole source document is deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentProfile {
    /// Opaque key, typically an email. Never validated as one.
    pub user_id: String,

    pub gpa_weighted: Option<f64>,
    pub gpa_unweighted: Option<f64>,
    pub sat_total: Option<i32>,
    pub act_composite: Option<i32>,
    /// Free-form, e.g. "12/450".
    pub class_rank: Option<String>,
    pub intended_major: Option<String>,
    pub graduation_year: Option<i32>,
    pub school: Option<String>,
    pub location: Option<String>,

    pub courses: Vec<Course>,
    pub ap_exams: Vec<ApExam>,
    pub extracurriculars: Vec<Activity>,
    pub leadership_roles: Vec<Activity>,
    pub awards: Vec<Award>,
    pub work_experience: Vec<WorkExperience>,

    /// field name -> source filenames that contributed a value to it.
    /// Fields set by onboarding carry no entry here.
    pub field_sources: BTreeMap<String, BTreeSet<String>>,

    /// Concatenation of all per-upload extracted text, separator-delimited,
    /// append-only. Repeated uploads of the same content append again.
    pub raw_content: String,

    /// Incremented on every committed merge; keys the S3 snapshot.
    pub version: i32,
    pub updated_at: DateTime<Utc>,
}

impl StudentProfile {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            gpa_weighted: None,
            gpa_unweighted: None,
            sat_total: None,
            act_composite: None,
            class_rank: None,
            intended_major: None,
            graduation_year: None,
            school: None,
            location: None,
            courses: Vec::new(),
            ap_exams: Vec::new(),
            extracurriculars: Vec::new(),
            leadership_roles: Vec::new(),
            awards: Vec::new(),
            work_experience: Vec::new(),
            field_sources: BTreeMap::new(),
            raw_content: String::new(),
            version: 0,
            updated_at: Utc::now(),
        }
    }
}

/// Structured fields extracted from one uploaded document, as delivered by
/// the document-ingestion boundary. Every key is optional: partial or
/// malformed extractions deserialize to nulls/empties rather than failing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedFields {
    pub gpa_weighted: Option<f64>,
    pub gpa_unweighted: Option<f64>,
    pub sat_total: Option<i32>,
    pub act_composite: Option<i32>,
    pub class_rank: Option<String>,
    pub intended_major: Option<String>,
    pub graduation_year: Option<i32>,
    pub school: Option<String>,
    pub location: Option<String>,
    pub courses: Vec<Course>,
    pub ap_exams: Vec<ApExam>,
    pub extracurriculars: Vec<Activity>,
    pub leadership_roles: Vec<Activity>,
    pub awards: Vec<Award>,
    pub work_experience: Vec<WorkExperience>,
}

/// Scalars collected by the onboarding form. No file source is recorded.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OnboardingFields {
    pub gpa_weighted: Option<f64>,
    pub gpa_unweighted: Option<f64>,
    pub sat_total: Option<i32>,
    pub act_composite: Option<i32>,
    pub class_rank: Option<String>,
    pub intended_major: Option<String>,
    pub graduation_year: Option<i32>,
    pub school: Option<String>,
    pub location: Option<String>,
}

/// Outcome of merging one upload into a profile.
#[derive(Debug, Clone, Serialize)]
pub struct MergeResult {
    /// True when this upload created the profile.
    pub created: bool,
    /// Fields whose value actually changed — the fit-cache invalidation input.
    pub changed_fields: Vec<String>,
    pub version: i32,
}

/// Outcome of rolling back a deleted source document.
#[derive(Debug, Clone, Serialize)]
pub struct RemovalResult {
    /// Fields nulled because the deleted document was their only source.
    pub cleared_fields: Vec<String>,
    /// Fields that kept their value because other sources remain.
    pub retained_fields: Vec<String>,
}
