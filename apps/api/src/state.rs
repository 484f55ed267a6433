use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::search::SearchBackend;

/// Shared application state injected into all route handlers via Axum
/// extractors. Every external-service client is constructed once at startup
/// and carried here — no module-level handle caches.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub s3: S3Client,
    pub llm: LlmClient,
    pub config: Config,
    /// Pluggable search strategy, selected at startup via SEARCH_BACKEND.
    pub search: Arc<dyn SearchBackend>,
}
