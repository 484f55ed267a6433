//! Semantic-retrieval strategy backed by qdrant.
//!
//! Retrieval and ranking are delegated to the engine (text queries run
//! through server-side inference); this module routes a logical scope to
//! its physical collection and normalizes the response payloads.

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, value::Kind, Condition, Document, Filter, PointId, Query,
    QueryPointsBuilder, Value,
};
use qdrant_client::Qdrant;

use crate::errors::AppError;
use crate::search::{sort_documents, ScoredDocument, SearchBackend, SearchFilters, SearchScope};

/// Shared knowledge-base collection.
pub const KB_COLLECTION: &str = "kb_universities";
/// Per-user document collections are prefixed with this.
pub const USER_COLLECTION_PREFIX: &str = "docs_";

/// Model used for server-side query inference. Must match the model the
/// ingestion pipeline embeds documents with.
const EMBEDDING_MODEL: &str = "sentence-transformers/all-minilm-l6-v2";

/// Maps a logical scope to its physical collection.
pub fn collection_for(scope: &SearchScope) -> String {
    match scope {
        SearchScope::Universities => KB_COLLECTION.to_string(),
        SearchScope::UserDocuments { user_id } => {
            format!("{USER_COLLECTION_PREFIX}{}", sanitize_collection_id(user_id))
        }
    }
}

/// Collection names accept a narrower charset than user ids (emails).
fn sanitize_collection_id(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

pub struct SemanticBackend {
    client: Qdrant,
}

impl SemanticBackend {
    pub fn new(url: &str) -> Result<Self, AppError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| AppError::Upstream(format!("qdrant client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SearchBackend for SemanticBackend {
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<ScoredDocument>, AppError> {
        let collection = collection_for(&filters.scope);

        let mut conditions = Vec::new();
        if let Some(state) = &filters.state {
            conditions.push(Condition::matches("state", state.clone()));
        }
        if let Some(school_type) = &filters.school_type {
            conditions.push(Condition::matches("type", school_type.clone()));
        }

        let mut request = QueryPointsBuilder::new(collection)
            .query(Query::new_nearest(Document::new(query, EMBEDDING_MODEL)))
            .limit(limit as u64)
            .with_payload(true);
        if !conditions.is_empty() {
            request = request.filter(Filter::must(conditions));
        }

        let response = self
            .client
            .query(request)
            .await
            .map_err(|e| AppError::Upstream(format!("qdrant query: {e}")))?;

        let mut docs: Vec<ScoredDocument> = response
            .result
            .into_iter()
            .map(|point| ScoredDocument {
                id: point_id_to_string(point.id),
                score: f64::from(point.score),
                payload: payload_to_json(point.payload),
            })
            .collect();

        sort_documents(&mut docs);
        Ok(docs)
    }

    fn name(&self) -> &'static str {
        "semantic"
    }
}

fn point_id_to_string(id: Option<PointId>) -> String {
    match id.and_then(|p| p.point_id_options) {
        Some(PointIdOptions::Num(n)) => n.to_string(),
        Some(PointIdOptions::Uuid(u)) => u,
        None => String::new(),
    }
}

/// Converts qdrant payload values into plain JSON so engine types never
/// cross the `ScoredDocument` contract.
fn payload_to_json(payload: HashMap<String, Value>) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (key, value) in payload {
        map.insert(key, qdrant_value_to_json(value));
    }
    serde_json::Value::Object(map)
}

fn qdrant_value_to_json(value: Value) -> serde_json::Value {
    match value.kind {
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(Kind::IntegerValue(i)) => serde_json::json!(i),
        Some(Kind::DoubleValue(d)) => serde_json::json!(d),
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::ListValue(list)) => serde_json::Value::Array(
            list.values.into_iter().map(qdrant_value_to_json).collect(),
        ),
        Some(Kind::StructValue(object)) => {
            let mut map = serde_json::Map::new();
            for (key, value) in object.fields {
                map.insert(key, qdrant_value_to_json(value));
            }
            serde_json::Value::Object(map)
        }
        Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdrant_client::qdrant::{ListValue, Struct};

    #[test]
    fn test_kb_scope_routes_to_shared_collection() {
        assert_eq!(collection_for(&SearchScope::Universities), "kb_universities");
    }

    #[test]
    fn test_user_scope_routes_to_per_user_collection() {
        let scope = SearchScope::UserDocuments {
            user_id: "a@example.com".to_string(),
        };
        assert_eq!(collection_for(&scope), "docs_a_example_com");
    }

    #[test]
    fn test_point_id_variants() {
        let num = PointId {
            point_id_options: Some(PointIdOptions::Num(42)),
        };
        let uuid = PointId {
            point_id_options: Some(PointIdOptions::Uuid("abc-123".to_string())),
        };
        assert_eq!(point_id_to_string(Some(num)), "42");
        assert_eq!(point_id_to_string(Some(uuid)), "abc-123");
        assert_eq!(point_id_to_string(None), "");
    }

    #[test]
    fn test_payload_conversion_nested() {
        let mut fields = HashMap::new();
        fields.insert(
            "name".to_string(),
            Value {
                kind: Some(Kind::StringValue("Tech State".to_string())),
            },
        );
        let mut payload = HashMap::new();
        payload.insert(
            "rank".to_string(),
            Value {
                kind: Some(Kind::IntegerValue(30)),
            },
        );
        payload.insert(
            "record".to_string(),
            Value {
                kind: Some(Kind::StructValue(Struct { fields })),
            },
        );
        payload.insert(
            "tags".to_string(),
            Value {
                kind: Some(Kind::ListValue(ListValue {
                    values: vec![Value {
                        kind: Some(Kind::StringValue("public".to_string())),
                    }],
                })),
            },
        );

        let json = payload_to_json(payload);
        assert_eq!(json["rank"], 30);
        assert_eq!(json["record"]["name"], "Tech State");
        assert_eq!(json["tags"][0], "public");
    }
}
