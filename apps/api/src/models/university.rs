use serde::{Deserialize, Serialize};

/// Middle-50% admitted range for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MidRange {
    pub p25: f64,
    pub p75: f64,
}

/// Admitted-student ranges published for a cohort.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmittedRanges {
    pub gpa: Option<MidRange>,
    pub sat: Option<MidRange>,
    pub act: Option<MidRange>,
}

impl AdmittedRanges {
    pub fn is_empty(&self) -> bool {
        self.gpa.is_none() && self.sat.is_none() && self.act.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Major {
    pub name: String,
    /// Major-specific acceptance rate in [0, 1], when published.
    #[serde(default)]
    pub acceptance_rate: Option<f64>,
    /// Capacity-constrained ("impacted") major.
    #[serde(default)]
    pub impacted: Option<bool>,
    #[serde(default)]
    pub admitted_ranges: Option<AdmittedRanges>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollegeUnit {
    pub name: String,
    #[serde(default)]
    pub majors: Vec<Major>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AcademicStructure {
    pub colleges: Vec<CollegeUnit>,
}

impl AcademicStructure {
    /// Case-insensitive lookup of a major across all colleges.
    pub fn find_major(&self, name: &str) -> Option<&Major> {
        self.colleges
            .iter()
            .flat_map(|c| c.majors.iter())
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UniversityLocation {
    pub state: Option<String>,
    /// "public" | "private" | ...
    #[serde(rename = "type")]
    pub location_type: Option<String>,
}

/// Read-mostly university record, externally populated.
/// Consumed by the fit computer and the search backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniversityRecord {
    /// Stable slug. Callers normalize before matching; see
    /// `universities::normalize_university_id`.
    pub university_id: String,
    pub name: String,
    /// Overall acceptance rate in [0, 1].
    #[serde(default)]
    pub acceptance_rate: Option<f64>,
    #[serde(default)]
    pub us_news_rank: Option<i32>,
    #[serde(default)]
    pub location: Option<UniversityLocation>,
    #[serde(default)]
    pub academic_structure: AcademicStructure,
    /// University-wide admitted ranges.
    #[serde(default)]
    pub admissions_data: Option<AdmittedRanges>,
    #[serde(default)]
    pub description: Option<String>,
}
