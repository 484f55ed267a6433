//! Fit classification — pure, deterministic, rule-based. No I/O, no LLM.
//!
//! A student's academic metrics are compared against the university's
//! published middle-50% admitted ranges (major-specific when available),
//! blended with overall and major-specific acceptance rates, and the
//! resulting 0–100 match score is banded into Safety/Target/Reach.

use crate::models::fit::{FitAssessment, FitCategory};
use crate::models::profile::StudentProfile;
use crate::models::university::{AdmittedRanges, MidRange, UniversityRecord};

// Band thresholds. score >= SAFETY_MIN -> Safety, >= TARGET_MIN -> Target,
// below -> Reach. The band partition is policy, kept in one place.
pub const SAFETY_MIN: u32 = 75;
pub const TARGET_MIN: u32 = 45;

// Blend weights. A fully neutral profile at a 50%-acceptance school lands
// exactly on BASE_SCORE.
const BASE_SCORE: f64 = 50.0;
const ACADEMIC_WEIGHT: f64 = 30.0;
const ACCEPTANCE_MIDPOINT: f64 = 0.5;
const ACCEPTANCE_WEIGHT: f64 = 40.0;
const MAJOR_RATE_WEIGHT: f64 = 50.0;

/// Acceptance rate below which a school is flagged as competitive for
/// everyone, whatever the academic alignment says.
const HIGHLY_SELECTIVE_RATE: f64 = 0.15;

pub fn classify(score: u32) -> FitCategory {
    if score >= SAFETY_MIN {
        FitCategory::Safety
    } else if score >= TARGET_MIN {
        FitCategory::Target
    } else {
        FitCategory::Reach
    }
}

pub fn compute_fit(
    profile: &StudentProfile,
    university: &UniversityRecord,
    intended_major: &str,
) -> FitAssessment {
    let mut gaps = Vec::new();
    let mut recommendations = Vec::new();

    let intended_major = intended_major.trim();
    let major = if intended_major.is_empty() {
        None
    } else {
        university.academic_structure.find_major(intended_major)
    };
    if !intended_major.is_empty() && major.is_none() {
        gaps.push(format!(
            "'{}' was not found among {}'s published programs; using university-wide statistics",
            intended_major, university.name
        ));
    }

    let ranges = major
        .and_then(|m| m.admitted_ranges.as_ref())
        .filter(|r| !r.is_empty())
        .or(university
            .admissions_data
            .as_ref()
            .filter(|r| !r.is_empty()));

    let overall_rate = university.acceptance_rate;
    let major_rate = major.and_then(|m| m.acceptance_rate);

    // With no ranges and no acceptance rate there is nothing to classify
    // against: a distinct unknown state, never coerced to a default band.
    if ranges.is_none() && overall_rate.is_none() && major_rate.is_none() {
        gaps.push(format!(
            "{} has not published admissions statistics; fit cannot be classified",
            university.name
        ));
        recommendations
            .push("Check the university's admissions page for current statistics".to_string());
        return FitAssessment {
            fit_category: None,
            match_score: 0,
            gap_analysis: gaps,
            recommendations,
        };
    }

    let alignment = academic_alignment(profile, ranges, &mut gaps, &mut recommendations);

    let mut score = BASE_SCORE + ACADEMIC_WEIGHT * alignment;

    // Selectivity term: prefer the overall rate, falling back to the major
    // rate when that's all the record carries.
    match overall_rate.or(major_rate) {
        Some(rate) => {
            score += (rate - ACCEPTANCE_MIDPOINT) * ACCEPTANCE_WEIGHT;
            if rate < HIGHLY_SELECTIVE_RATE {
                recommendations.push(format!(
                    "{} admits under {:.0}% of applicants — treat it as competitive regardless of academic strength",
                    university.name,
                    HIGHLY_SELECTIVE_RATE * 100.0
                ));
            }
        }
        None => gaps.push(format!(
            "{} has no published acceptance rate; selectivity left neutral",
            university.name
        )),
    }

    // Major differential: impacted/competitive programs admit below the
    // university-wide rate.
    if let (Some(major_rate), Some(overall_rate)) = (major_rate, overall_rate) {
        score += (major_rate - overall_rate) * MAJOR_RATE_WEIGHT;
        if major_rate < overall_rate {
            gaps.push(format!(
                "Admission to {} is more selective than {} overall ({:.0}% vs {:.0}%)",
                major.map(|m| m.name.as_str()).unwrap_or(intended_major),
                university.name,
                major_rate * 100.0,
                overall_rate * 100.0
            ));
        }
    }
    if let Some(major) = major {
        if major.impacted == Some(true) {
            gaps.push(format!(
                "{} is an impacted major at {}",
                major.name, university.name
            ));
            recommendations.push(
                "Consider listing an alternate major — impacted programs admit well below the university-wide rate"
                    .to_string(),
            );
        }
    }

    let match_score = score.round().clamp(0.0, 100.0) as u32;

    if recommendations.is_empty() {
        recommendations.push(
            "Academic profile aligns with this school — focus on essays and extracurricular depth"
                .to_string(),
        );
    }

    FitAssessment {
        fit_category: Some(classify(match_score)),
        match_score,
        gap_analysis: gaps,
        recommendations,
    }
}

/// Mean alignment over the metrics both sides publish, in [-1, 1].
/// Missing data on either side contributes nothing and notes the gap —
/// it never fails the computation.
fn academic_alignment(
    profile: &StudentProfile,
    ranges: Option<&AdmittedRanges>,
    gaps: &mut Vec<String>,
    recommendations: &mut Vec<String>,
) -> f64 {
    let mut alignments = Vec::new();

    let gpa = profile.gpa_unweighted.or(profile.gpa_weighted);
    match (gpa, ranges.and_then(|r| r.gpa)) {
        (Some(gpa), Some(range)) => {
            let a = range_alignment(gpa, range);
            alignments.push(a);
            if a < 0.0 {
                gaps.push(format!(
                    "GPA {gpa:.2} is below the middle-50% admitted range ({:.2}–{:.2})",
                    range.p25, range.p75
                ));
                recommendations.push(
                    "GPA is below the admitted range — highlight course rigor and grade trend"
                        .to_string(),
                );
            }
        }
        (None, Some(_)) => {
            gaps.push("No GPA on file; academic comparison is partial".to_string());
            recommendations.push(
                "Upload a transcript so GPA can be compared against admitted ranges".to_string(),
            );
        }
        (Some(_), None) => {
            gaps.push("No admitted GPA range published for this cohort".to_string());
        }
        (None, None) => {}
    }

    match (profile.sat_total, ranges.and_then(|r| r.sat)) {
        (Some(sat), Some(range)) => {
            let a = range_alignment(f64::from(sat), range);
            alignments.push(a);
            if a < 0.0 {
                gaps.push(format!(
                    "SAT {sat} is below the middle-50% admitted range ({:.0}–{:.0})",
                    range.p25, range.p75
                ));
                recommendations.push(
                    "SAT is below the admitted range — consider a retake or applying test-optional"
                        .to_string(),
                );
            }
        }
        (None, Some(_)) => {
            gaps.push("No SAT score on file; academic comparison is partial".to_string());
        }
        _ => {}
    }

    match (profile.act_composite, ranges.and_then(|r| r.act)) {
        (Some(act), Some(range)) => {
            let a = range_alignment(f64::from(act), range);
            alignments.push(a);
            if a < 0.0 {
                gaps.push(format!(
                    "ACT {act} is below the middle-50% admitted range ({:.0}–{:.0})",
                    range.p25, range.p75
                ));
            }
        }
        (None, Some(_)) => {
            gaps.push("No ACT score on file; academic comparison is partial".to_string());
        }
        _ => {}
    }

    if alignments.is_empty() {
        gaps.push("No academic metrics could be compared; alignment treated as neutral".to_string());
        return 0.0;
    }
    alignments.iter().sum::<f64>() / alignments.len() as f64
}

/// Position of `value` against a middle-50% range, clamped to [-1, 1]:
/// 0 at the 25th percentile, 1 at or above the 75th, negative below.
fn range_alignment(value: f64, range: MidRange) -> f64 {
    let span = range.p75 - range.p25;
    if span <= 0.0 {
        return 0.0;
    }
    ((value - range.p25) / span).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::university::{AcademicStructure, CollegeUnit, Major, UniversityLocation};

    fn student(gpa: Option<f64>, sat: Option<i32>, major: &str) -> StudentProfile {
        let mut p = StudentProfile::new("student@example.com");
        p.gpa_unweighted = gpa;
        p.sat_total = sat;
        p.intended_major = Some(major.to_string());
        p
    }

    fn engineering_school() -> UniversityRecord {
        UniversityRecord {
            university_id: "tech-state".to_string(),
            name: "Tech State".to_string(),
            acceptance_rate: Some(0.12),
            us_news_rank: Some(30),
            location: Some(UniversityLocation {
                state: Some("CA".to_string()),
                location_type: Some("public".to_string()),
            }),
            academic_structure: AcademicStructure {
                colleges: vec![CollegeUnit {
                    name: "College of Engineering".to_string(),
                    majors: vec![Major {
                        name: "Computer Science".to_string(),
                        acceptance_rate: Some(0.08),
                        impacted: Some(true),
                        admitted_ranges: Some(AdmittedRanges {
                            gpa: Some(MidRange { p25: 3.7, p75: 4.0 }),
                            sat: Some(MidRange {
                                p25: 1400.0,
                                p75: 1500.0,
                            }),
                            act: None,
                        }),
                    }],
                }],
            },
            admissions_data: Some(AdmittedRanges {
                gpa: Some(MidRange { p25: 3.5, p75: 3.9 }),
                sat: Some(MidRange {
                    p25: 1300.0,
                    p75: 1480.0,
                }),
                act: Some(MidRange { p25: 28.0, p75: 33.0 }),
            }),
            description: None,
        }
    }

    fn open_admission_school() -> UniversityRecord {
        UniversityRecord {
            university_id: "state-u".to_string(),
            name: "State U".to_string(),
            acceptance_rate: Some(0.8),
            us_news_rank: None,
            location: None,
            academic_structure: AcademicStructure::default(),
            admissions_data: Some(AdmittedRanges {
                gpa: Some(MidRange { p25: 3.0, p75: 3.5 }),
                sat: None,
                act: None,
            }),
            description: None,
        }
    }

    #[test]
    fn test_pinned_scenario_is_target_with_impaction_noted() {
        // GPA 3.9 vs 3.7–4.0, SAT 1450 vs 1400–1500, overall 12%, CS 8%
        // impacted: the band pinned by the threshold constants is Target.
        let profile = student(Some(3.9), Some(1450), "Computer Science");
        let result = compute_fit(&profile, &engineering_school(), "Computer Science");

        assert_eq!(result.fit_category, Some(FitCategory::Target));
        assert!(result.match_score >= TARGET_MIN && result.match_score < SAFETY_MIN);
        assert!(
            result.gap_analysis.iter().any(|g| g.contains("impacted")),
            "gap_analysis should note impaction: {:?}",
            result.gap_analysis
        );
        assert!(result
            .gap_analysis
            .iter()
            .any(|g| g.contains("more selective")));
    }

    #[test]
    fn test_strong_student_at_open_school_is_safety() {
        let profile = student(Some(4.0), None, "");
        let result = compute_fit(&profile, &open_admission_school(), "");
        assert_eq!(result.fit_category, Some(FitCategory::Safety));
    }

    #[test]
    fn test_weak_student_at_selective_school_is_reach() {
        let profile = student(Some(3.0), Some(1200), "Computer Science");
        let result = compute_fit(&profile, &engineering_school(), "Computer Science");
        assert_eq!(result.fit_category, Some(FitCategory::Reach));
        assert!(result
            .recommendations
            .iter()
            .any(|r| r.contains("below the admitted range")));
    }

    #[test]
    fn test_score_monotone_in_gpa() {
        // Raising GPA with everything else fixed must never lower the score
        // or drop the band.
        let university = engineering_school();
        let mut last_score = 0;
        for tenths in 20..=40 {
            let gpa = f64::from(tenths) / 10.0;
            let profile = student(Some(gpa), Some(1450), "Computer Science");
            let result = compute_fit(&profile, &university, "Computer Science");
            assert!(
                result.match_score >= last_score,
                "score decreased at gpa {gpa}: {} < {last_score}",
                result.match_score
            );
            last_score = result.match_score;
        }
    }

    #[test]
    fn test_missing_university_statistics_is_unknown() {
        let bare = UniversityRecord {
            university_id: "mystery-college".to_string(),
            name: "Mystery College".to_string(),
            acceptance_rate: None,
            us_news_rank: None,
            location: None,
            academic_structure: AcademicStructure::default(),
            admissions_data: None,
            description: None,
        };
        let profile = student(Some(3.9), Some(1450), "History");
        let result = compute_fit(&profile, &bare, "History");

        assert_eq!(result.fit_category, None);
        assert!(result
            .gap_analysis
            .iter()
            .any(|g| g.contains("cannot be classified")));
    }

    #[test]
    fn test_unmatched_major_falls_back_to_university_stats() {
        let profile = student(Some(3.9), Some(1450), "Underwater Basket Weaving");
        let result = compute_fit(&profile, &engineering_school(), "Underwater Basket Weaving");

        assert!(result.fit_category.is_some());
        assert!(result
            .gap_analysis
            .iter()
            .any(|g| g.contains("not found among")));
    }

    #[test]
    fn test_missing_student_data_is_neutral_not_an_error() {
        let profile = student(None, None, "Computer Science");
        let result = compute_fit(&profile, &engineering_school(), "Computer Science");

        assert!(result.fit_category.is_some());
        assert!(result.gap_analysis.iter().any(|g| g.contains("No GPA")));
        assert!(result
            .recommendations
            .iter()
            .any(|r| r.contains("transcript")));
    }

    #[test]
    fn test_band_thresholds() {
        assert_eq!(classify(SAFETY_MIN), FitCategory::Safety);
        assert_eq!(classify(SAFETY_MIN - 1), FitCategory::Target);
        assert_eq!(classify(TARGET_MIN), FitCategory::Target);
        assert_eq!(classify(TARGET_MIN - 1), FitCategory::Reach);
        assert_eq!(classify(100), FitCategory::Safety);
        assert_eq!(classify(0), FitCategory::Reach);
    }

    #[test]
    fn test_range_alignment_positions() {
        let range = MidRange { p25: 3.7, p75: 4.0 };
        assert_eq!(range_alignment(3.7, range), 0.0);
        assert_eq!(range_alignment(4.0, range), 1.0);
        assert_eq!(range_alignment(4.3, range), 1.0); // clamped above
        assert!(range_alignment(3.5, range) < 0.0);
        assert_eq!(range_alignment(2.0, range), -1.0); // clamped below
    }

    #[test]
    fn test_degenerate_range_is_neutral() {
        let range = MidRange { p25: 3.9, p75: 3.9 };
        assert_eq!(range_alignment(4.0, range), 0.0);
    }
}
