use anyhow::{bail, Context, Result};

/// Which search backend strategy to run. All three satisfy the same
/// `SearchBackend` contract; exactly one is constructed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBackendKind {
    /// Elasticsearch keyword/relevance search.
    Keyword,
    /// Postgres candidate fetch + in-process weighted scoring.
    Memory,
    /// Qdrant semantic retrieval.
    Semantic,
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub search_backend: SearchBackendKind,
    /// Required when `search_backend = keyword`.
    pub elasticsearch_url: Option<String>,
    /// Required when `search_backend = semantic`.
    pub qdrant_url: Option<String>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let search_backend = match std::env::var("SEARCH_BACKEND")
            .unwrap_or_else(|_| "memory".to_string())
            .as_str()
        {
            "keyword" => SearchBackendKind::Keyword,
            "memory" => SearchBackendKind::Memory,
            "semantic" => SearchBackendKind::Semantic,
            other => bail!("SEARCH_BACKEND must be keyword|memory|semantic, got '{other}'"),
        };

        let elasticsearch_url = std::env::var("ELASTICSEARCH_URL").ok();
        let qdrant_url = std::env::var("QDRANT_URL").ok();

        if search_backend == SearchBackendKind::Keyword && elasticsearch_url.is_none() {
            bail!("ELASTICSEARCH_URL is required when SEARCH_BACKEND=keyword");
        }
        if search_backend == SearchBackendKind::Semantic && qdrant_url.is_none() {
            bail!("QDRANT_URL is required when SEARCH_BACKEND=semantic");
        }

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            search_backend,
            elasticsearch_url,
            qdrant_url,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
