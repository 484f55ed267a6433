//! In-memory scored-filter strategy.
//!
//! Fetches a filtered candidate set from Postgres and ranks it in-process
//! with an explicit weight table, so the ordering is reproducible without
//! any external engine.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::university::UniversityRecord;
use crate::profile::merge::raw_blocks;
use crate::profile::store as profile_store;
use crate::search::{
    sort_documents, university_payload, ScoredDocument, SearchBackend, SearchFilters, SearchScope,
};
use crate::universities;

// Ranking weight table. Exact name match dominates substring matches,
// which dominate major-list matches, which dominate free-text hits.
pub const W_NAME_EXACT: f64 = 10.0;
pub const W_NAME_SUBSTRING: f64 = 4.0;
pub const W_MAJOR_MATCH: f64 = 2.0;
pub const W_FREE_TEXT: f64 = 1.0;

pub struct InMemoryBackend {
    pool: PgPool,
}

impl InMemoryBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SearchBackend for InMemoryBackend {
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<ScoredDocument>, AppError> {
        match &filters.scope {
            SearchScope::Universities => {
                let candidates = universities::list_candidates(
                    &self.pool,
                    filters.state.as_deref(),
                    filters.school_type.as_deref(),
                )
                .await?;
                Ok(rank_universities(&candidates, query, limit))
            }
            SearchScope::UserDocuments { user_id } => {
                let Some(profile) = profile_store::get(&self.pool, user_id).await? else {
                    return Ok(Vec::new());
                };
                Ok(rank_documents(&profile.raw_content, query, limit))
            }
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Scores each candidate as a weighted sum over field matches and returns
/// the top `limit`, ties broken by university id.
pub fn rank_universities(
    candidates: &[UniversityRecord],
    query: &str,
    limit: usize,
) -> Vec<ScoredDocument> {
    let query_lower = query.trim().to_lowercase();
    let terms = tokenize(&query_lower);

    let mut docs: Vec<ScoredDocument> = candidates
        .iter()
        .filter_map(|record| {
            let score = score_university(record, &query_lower, &terms);
            // An empty query browses the filtered set; otherwise only
            // matching candidates are returned.
            if score <= 0.0 && !terms.is_empty() {
                return None;
            }
            Some(ScoredDocument {
                id: record.university_id.clone(),
                score,
                payload: university_payload(record),
            })
        })
        .collect();

    sort_documents(&mut docs);
    docs.truncate(limit);
    docs
}

fn score_university(record: &UniversityRecord, query_lower: &str, terms: &[String]) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }

    let name = record.name.to_lowercase();
    let description = record
        .description
        .as_deref()
        .map(str::to_lowercase)
        .unwrap_or_default();
    let majors: Vec<String> = record
        .academic_structure
        .colleges
        .iter()
        .flat_map(|c| c.majors.iter())
        .map(|m| m.name.to_lowercase())
        .collect();

    let mut score = 0.0;
    if name == *query_lower {
        score += W_NAME_EXACT;
    }
    for term in terms {
        if name.contains(term.as_str()) {
            score += W_NAME_SUBSTRING;
        }
        if majors.iter().any(|m| m.contains(term.as_str())) {
            score += W_MAJOR_MATCH;
        }
        if description.contains(term.as_str()) {
            score += W_FREE_TEXT;
        }
    }
    score
}

/// Free-text ranking over one profile's uploaded-document blocks.
pub fn rank_documents(raw_content: &str, query: &str, limit: usize) -> Vec<ScoredDocument> {
    let terms = tokenize(&query.trim().to_lowercase());

    let mut docs: Vec<ScoredDocument> = raw_blocks(raw_content)
        .into_iter()
        .enumerate()
        .filter_map(|(index, (filename, text))| {
            let text_lower = text.to_lowercase();
            let score: f64 = terms
                .iter()
                .filter(|t| text_lower.contains(t.as_str()))
                .count() as f64
                * W_FREE_TEXT;
            if score <= 0.0 && !terms.is_empty() {
                return None;
            }
            Some(ScoredDocument {
                // Re-uploads repeat a filename; the index keeps ids unique.
                id: format!("{filename}#{index}"),
                score,
                payload: serde_json::json!({
                    "filename": filename,
                    "text": text,
                }),
            })
        })
        .collect();

    sort_documents(&mut docs);
    docs.truncate(limit);
    docs
}

fn tokenize(query_lower: &str) -> Vec<String> {
    query_lower
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::university::{AcademicStructure, CollegeUnit, Major};
    use crate::profile::merge::append_raw_content;

    fn university(id: &str, name: &str, majors: &[&str], description: &str) -> UniversityRecord {
        UniversityRecord {
            university_id: id.to_string(),
            name: name.to_string(),
            acceptance_rate: None,
            us_news_rank: None,
            location: None,
            academic_structure: AcademicStructure {
                colleges: vec![CollegeUnit {
                    name: "Arts & Sciences".to_string(),
                    majors: majors
                        .iter()
                        .map(|m| Major {
                            name: m.to_string(),
                            acceptance_rate: None,
                            impacted: None,
                            admitted_ranges: None,
                        })
                        .collect(),
                }],
            },
            admissions_data: None,
            description: Some(description.to_string()),
        }
    }

    fn candidates() -> Vec<UniversityRecord> {
        vec![
            university(
                "tech-state",
                "Tech State",
                &["Computer Science"],
                "A large public research university",
            ),
            university(
                "liberal-arts-college",
                "Liberal Arts College",
                &["History"],
                "Small college known for computer labs",
            ),
            university(
                "computer-institute",
                "Computer Institute",
                &["Computer Engineering"],
                "Focused engineering school",
            ),
        ]
    }

    #[test]
    fn test_exact_name_match_outranks_everything() {
        let results = rank_universities(&candidates(), "Tech State", 10);
        assert_eq!(results[0].id, "tech-state");
        assert!(results[0].score >= W_NAME_EXACT);
    }

    #[test]
    fn test_name_substring_outranks_free_text() {
        let results = rank_universities(&candidates(), "computer", 10);
        // "Computer Institute" matches on name; the liberal arts college
        // only matches its description.
        assert_eq!(results[0].id, "computer-institute");
        let liberal = results
            .iter()
            .find(|d| d.id == "liberal-arts-college")
            .expect("free-text match should be present");
        assert!(results[0].score > liberal.score);
    }

    #[test]
    fn test_no_match_returns_empty_not_error() {
        let results = rank_universities(&candidates(), "zzzzz", 10);
        assert!(results.is_empty());
    }

    #[test]
    fn test_empty_query_browses_filtered_set() {
        let results = rank_universities(&candidates(), "", 2);
        assert_eq!(results.len(), 2);
        // Zero scores everywhere: ordering falls back to id.
        assert_eq!(results[0].id, "computer-institute");
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let a = rank_universities(&candidates(), "computer", 10);
        let b = rank_universities(&candidates(), "computer", 10);
        assert_eq!(a, b);
    }

    #[test]
    fn test_limit_truncates_after_ranking() {
        let results = rank_universities(&candidates(), "computer", 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "computer-institute");
    }

    #[test]
    fn test_rank_documents_by_term_hits() {
        let mut raw = String::new();
        append_raw_content(&mut raw, "resume.pdf", "debate team captain, robotics club");
        append_raw_content(&mut raw, "essay.docx", "an essay about robotics and debate and music");

        let results = rank_documents(&raw, "robotics debate music", 10);
        assert_eq!(results.len(), 2);
        assert!(results[0].id.starts_with("essay.docx"));
        assert!(results[0].score > results[1].score);
    }
}
