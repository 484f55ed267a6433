mod advisor;
mod college_list;
mod config;
mod credits;
mod db;
mod errors;
mod fit;
mod llm_client;
mod models;
mod profile;
mod routes;
mod search;
mod state;
mod universities;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, SearchBackendKind};
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::search::{
    keyword::KeywordBackend, memory::InMemoryBackend, semantic::SemanticBackend, SearchBackend,
};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    let crate_target = env!("CARGO_PKG_NAME").replace('-', "_");
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", crate_target, &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Compass API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Select the search strategy (all three satisfy the same contract)
    let search: Arc<dyn SearchBackend> = match config.search_backend {
        SearchBackendKind::Keyword => {
            let url = config
                .elasticsearch_url
                .clone()
                .context("ELASTICSEARCH_URL is required for the keyword backend")?;
            Arc::new(KeywordBackend::new(url))
        }
        SearchBackendKind::Memory => Arc::new(InMemoryBackend::new(db.clone())),
        SearchBackendKind::Semantic => {
            let url = config
                .qdrant_url
                .clone()
                .context("QDRANT_URL is required for the semantic backend")?;
            Arc::new(SemanticBackend::new(&url)?)
        }
    };
    info!("Search backend initialized: {}", search.name());

    // Build app state
    let state = AppState {
        db,
        s3,
        llm,
        config: config.clone(),
        search,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "compass-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
