use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::search::{ScoredDocument, SearchFilters, SearchScope};
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 50;

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    /// "universities" (default) or "user_documents".
    pub scope: Option<String>,
    pub user_id: Option<String>,
    pub state: Option<String>,
    pub school_type: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub backend: &'static str,
    pub count: usize,
    pub results: Vec<ScoredDocument>,
}

/// GET /api/v1/search
pub async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, AppError> {
    let scope = match params.scope.as_deref().unwrap_or("universities") {
        "universities" => SearchScope::Universities,
        "user_documents" => {
            let user_id = params.user_id.ok_or_else(|| {
                AppError::Validation(
                    "user_id is required for the user_documents scope".to_string(),
                )
            })?;
            SearchScope::UserDocuments { user_id }
        }
        other => {
            return Err(AppError::Validation(format!(
                "unknown search scope '{other}'"
            )))
        }
    };

    let filters = SearchFilters {
        scope,
        state: params.state,
        school_type: params.school_type,
    };
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

    let results = state.search.search(&params.q, &filters, limit).await?;
    Ok(Json(SearchResponse {
        backend: state.search.name(),
        count: results.len(),
        results,
    }))
}
