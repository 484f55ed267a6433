//! Search over universities and user documents.
//!
//! One contract, three interchangeable strategies selected by configuration:
//! Elasticsearch keyword relevance, in-process weighted scoring over a
//! Postgres candidate set, and qdrant semantic retrieval. `AppState` carries
//! the chosen strategy as `Arc<dyn SearchBackend>`.

pub mod handlers;
pub mod keyword;
pub mod memory;
pub mod semantic;

use async_trait::async_trait;
use serde::Serialize;

use crate::errors::AppError;
use crate::models::university::UniversityRecord;

/// The logical store a search runs against.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SearchScope {
    /// The shared university knowledge base.
    #[default]
    Universities,
    /// One student's uploaded documents.
    UserDocuments { user_id: String },
}

#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub scope: SearchScope,
    pub state: Option<String>,
    pub school_type: Option<String>,
}

/// Backend-neutral result row. `payload` never carries backend-specific
/// field names; each strategy normalizes before returning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDocument {
    pub id: String,
    pub score: f64,
    pub payload: serde_json::Value,
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Ordered descending by score, ties broken by id ascending so repeated
    /// calls are deterministic. Zero matches is an empty vec, not an error;
    /// upstream failures convert to `AppError::Upstream`.
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<ScoredDocument>, AppError>;

    /// Strategy label, reported alongside results for transparency.
    fn name(&self) -> &'static str;
}

/// Descending by score, id ascending on ties.
pub fn sort_documents(docs: &mut [ScoredDocument]) {
    docs.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// The payload shape every strategy emits for a university hit.
pub fn university_payload(record: &UniversityRecord) -> serde_json::Value {
    serde_json::json!({
        "name": record.name,
        "state": record.location.as_ref().and_then(|l| l.state.clone()),
        "type": record.location.as_ref().and_then(|l| l.location_type.clone()),
        "acceptance_rate": record.acceptance_rate,
        "us_news_rank": record.us_news_rank,
        "description": record.description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, score: f64) -> ScoredDocument {
        ScoredDocument {
            id: id.to_string(),
            score,
            payload: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_sort_descending_with_stable_tie_break() {
        let mut docs = vec![doc("b", 1.0), doc("a", 1.0), doc("c", 5.0)];
        sort_documents(&mut docs);
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }
}
