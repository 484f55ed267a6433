//! Thin glue over the text-generation boundary. The agent layer proper
//! (conversation state, tool orchestration) lives outside this service;
//! this endpoint wires knowledge-base context and the student's profile
//! into one schema-validated structured call.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::credits::ledger;
use crate::errors::AppError;
use crate::llm_client::prompts::{build_answer_prompt, ADVISOR_SYSTEM};
use crate::models::credits::CREDIT_TYPE_AI_MESSAGES;
use crate::profile::store as profile_store;
use crate::search::SearchFilters;
use crate::state::AppState;

const CONTEXT_LIMIT: usize = 5;

#[derive(Deserialize)]
pub struct AskRequest {
    pub user_id: String,
    pub question: String,
}

/// Shape the model is required to return; anything else is rejected at the
/// boundary and retried by the client.
#[derive(Debug, Deserialize)]
pub struct AdvisorReply {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

#[derive(Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub sources: Vec<String>,
    pub credits_remaining: i64,
}

/// POST /api/v1/advisor/ask
pub async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    if req.question.trim().is_empty() {
        return Err(AppError::Validation("question is required".to_string()));
    }

    let remaining = ledger::debit(
        &state.db,
        &req.user_id,
        CREDIT_TYPE_AI_MESSAGES,
        1,
        "advisor:ask",
    )
    .await?;

    // A KB outage degrades to an uncontextualized answer; the request
    // itself still completes.
    let context_docs = match state
        .search
        .search(&req.question, &SearchFilters::default(), CONTEXT_LIMIT)
        .await
    {
        Ok(docs) => docs,
        Err(e) => {
            warn!("Knowledge-base search unavailable for advisor: {e}");
            Vec::new()
        }
    };
    let context = if context_docs.is_empty() {
        "(no matching knowledge-base entries)".to_string()
    } else {
        context_docs
            .iter()
            .map(|d| format!("[{}] {}", d.id, d.payload))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let profile_summary = match profile_store::get(&state.db, &req.user_id).await? {
        Some(profile) => profile_store::render_profile_to_md(&profile),
        None => "(no profile on file)".to_string(),
    };

    let prompt = build_answer_prompt(&req.question, &profile_summary, &context);
    let reply: AdvisorReply = state
        .llm
        .call_json_validated(&prompt, ADVISOR_SYSTEM)
        .await
        .map_err(|e| AppError::Llm(e.to_string()))?;

    Ok(Json(AskResponse {
        answer: reply.answer,
        sources: reply.sources,
        credits_remaining: remaining,
    }))
}
