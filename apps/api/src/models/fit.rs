use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitCategory {
    Safety,
    Target,
    Reach,
}

impl FitCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitCategory::Safety => "safety",
            FitCategory::Target => "target",
            FitCategory::Reach => "reach",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "safety" => Some(FitCategory::Safety),
            "target" => Some(FitCategory::Target),
            "reach" => Some(FitCategory::Reach),
            _ => None,
        }
    }
}

/// Pure output of the fit computer — no identity, no timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitAssessment {
    /// None = the university record lacks the statistics needed to
    /// classify; a distinct low-confidence state, never coerced to a band.
    pub fit_category: Option<FitCategory>,
    /// 0–100.
    pub match_score: u32,
    pub gap_analysis: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Cached fit computation for one (user, university) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    pub user_id: String,
    pub university_id: String,
    pub fit_category: Option<FitCategory>,
    pub match_score: u32,
    pub gap_analysis: Vec<String>,
    pub recommendations: Vec<String>,
    /// Fingerprint of the profile content at computation time; a mismatch
    /// against the current profile means the entry is stale.
    pub profile_version_hash: String,
    pub computed_at: DateTime<Utc>,
}

impl FitResult {
    pub fn from_assessment(
        user_id: impl Into<String>,
        university_id: impl Into<String>,
        assessment: FitAssessment,
        profile_version_hash: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            university_id: university_id.into(),
            fit_category: assessment.fit_category,
            match_score: assessment.match_score,
            gap_analysis: assessment.gap_analysis,
            recommendations: assessment.recommendations,
            profile_version_hash: profile_version_hash.into(),
            computed_at: Utc::now(),
        }
    }
}
