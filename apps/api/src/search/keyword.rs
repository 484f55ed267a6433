//! Keyword/relevance strategy backed by Elasticsearch.
//!
//! Ranking itself is delegated to the engine; this module's job is query
//! construction (terms + filter translation) and normalizing the response
//! shape into `ScoredDocument` so no `_source`/`_score` naming leaks out.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::errors::AppError;
use crate::search::{sort_documents, ScoredDocument, SearchBackend, SearchFilters, SearchScope};

const UNIVERSITIES_INDEX: &str = "universities";
const USER_DOCUMENTS_INDEX: &str = "user_documents";
const REQUEST_TIMEOUT_SECS: u64 = 10;

pub struct KeywordBackend {
    client: Client,
    base_url: String,
}

impl KeywordBackend {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SearchBackend for KeywordBackend {
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<ScoredDocument>, AppError> {
        let index = match &filters.scope {
            SearchScope::Universities => UNIVERSITIES_INDEX,
            SearchScope::UserDocuments { .. } => USER_DOCUMENTS_INDEX,
        };
        let body = build_query(query, filters, limit);
        let url = format!("{}/{index}/_search", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("elasticsearch request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "elasticsearch returned {status}: {body}"
            )));
        }

        let parsed: EsSearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("elasticsearch response parse: {e}")))?;

        let mut docs: Vec<ScoredDocument> = parsed
            .hits
            .hits
            .into_iter()
            .map(|hit| ScoredDocument {
                id: hit.id,
                score: hit.score.unwrap_or(0.0),
                payload: hit.source,
            })
            .collect();

        // The engine orders by score but leaves ties engine-defined;
        // re-sort for the deterministic-ordering contract.
        sort_documents(&mut docs);
        docs.truncate(limit);
        Ok(docs)
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

/// Translates query + filters into an Elasticsearch bool query.
/// Name matches are boosted over major-list matches over free text,
/// mirroring the in-memory strategy's weight ordering.
fn build_query(query: &str, filters: &SearchFilters, limit: usize) -> serde_json::Value {
    let query = query.trim();
    let must = if query.is_empty() {
        json!({ "match_all": {} })
    } else {
        json!({
            "multi_match": {
                "query": query,
                "fields": ["name^3", "majors^2", "description"],
            }
        })
    };

    let mut filter = Vec::new();
    if let Some(state) = &filters.state {
        filter.push(json!({ "term": { "state": state } }));
    }
    if let Some(school_type) = &filters.school_type {
        filter.push(json!({ "term": { "type": school_type } }));
    }
    if let SearchScope::UserDocuments { user_id } = &filters.scope {
        filter.push(json!({ "term": { "user_id": user_id } }));
    }

    json!({
        "size": limit,
        "query": {
            "bool": {
                "must": [must],
                "filter": filter,
            }
        }
    })
}

#[derive(Deserialize)]
struct EsSearchResponse {
    hits: EsHits,
}

#[derive(Deserialize)]
struct EsHits {
    hits: Vec<EsHit>,
}

#[derive(Deserialize)]
struct EsHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score")]
    score: Option<f64>,
    #[serde(rename = "_source", default)]
    source: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query_with_terms_and_filters() {
        let filters = SearchFilters {
            scope: SearchScope::Universities,
            state: Some("CA".to_string()),
            school_type: Some("public".to_string()),
        };
        let body = build_query("computer science", &filters, 5);

        assert_eq!(body["size"], 5);
        assert_eq!(
            body["query"]["bool"]["must"][0]["multi_match"]["query"],
            "computer science"
        );
        let filter = body["query"]["bool"]["filter"].as_array().unwrap();
        assert_eq!(filter.len(), 2);
        assert_eq!(filter[0]["term"]["state"], "CA");
    }

    #[test]
    fn test_build_query_empty_is_match_all() {
        let body = build_query("  ", &SearchFilters::default(), 10);
        assert!(body["query"]["bool"]["must"][0]
            .as_object()
            .unwrap()
            .contains_key("match_all"));
    }

    #[test]
    fn test_user_documents_scope_adds_user_filter() {
        let filters = SearchFilters {
            scope: SearchScope::UserDocuments {
                user_id: "a@example.com".to_string(),
            },
            ..Default::default()
        };
        let body = build_query("essay", &filters, 10);
        let filter = body["query"]["bool"]["filter"].as_array().unwrap();
        assert_eq!(filter[0]["term"]["user_id"], "a@example.com");
    }

    #[test]
    fn test_response_normalization_hides_engine_fields() {
        let raw = json!({
            "hits": {
                "total": { "value": 2 },
                "hits": [
                    { "_id": "tech-state", "_score": 7.2, "_index": "universities",
                      "_source": { "name": "Tech State" } },
                    { "_id": "state-u", "_score": null,
                      "_source": { "name": "State U" } },
                ]
            }
        });
        let parsed: EsSearchResponse = serde_json::from_value(raw).unwrap();
        let docs: Vec<ScoredDocument> = parsed
            .hits
            .hits
            .into_iter()
            .map(|hit| ScoredDocument {
                id: hit.id,
                score: hit.score.unwrap_or(0.0),
                payload: hit.source,
            })
            .collect();

        assert_eq!(docs[0].id, "tech-state");
        assert_eq!(docs[0].payload["name"], "Tech State");
        assert!(docs[0].payload.get("_score").is_none());
        assert_eq!(docs[1].score, 0.0);
    }
}
