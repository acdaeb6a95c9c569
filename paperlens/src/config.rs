use anyhow::{Context, bail};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::completion::CompletionParams;
use crate::parser::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};

pub const DEFAULT_CONFIG_PATH: &str = "paperlens.toml";

// ──────────────────────────── TOML structure ────────────────────────────

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TomlConfig {
    pub api: ApiConfig,
    pub service: ServiceConfig,
    pub completion: CompletionConfig,
    pub embedding: EmbeddingConfig,
    pub vector_store: VectorStoreConfig,
    pub rag: RagConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_cors_origins() -> Vec<String> {
    [
        "http://localhost:5173",
        "http://localhost:3000",
        "http://localhost:5174",
    ]
    .map(String::from)
    .to_vec()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_version")]
    pub version: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            version: default_version(),
        }
    }
}

fn default_environment() -> String {
    "development".to_string()
}
fn default_version() -> String {
    "1.0.0".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default = "default_fallback_model")]
    pub fallback_model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_completion_base_url(),
            model: default_completion_model(),
            fallback_model: default_fallback_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_completion_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_completion_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}
fn default_fallback_model() -> Option<String> {
    Some("llama-3.1-8b-instant".to_string())
}
fn default_temperature() -> f32 {
    CompletionParams::default().temperature
}
fn default_max_tokens() -> u32 {
    CompletionParams::default().max_tokens
}
fn default_top_p() -> f32 {
    CompletionParams::default().top_p
}
fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
            dimensions: default_dimensions(),
        }
    }
}

fn default_embedding_base_url() -> String {
    "http://localhost:11434/v1".to_string()
}
fn default_embedding_model() -> String {
    "all-minilm".to_string()
}
fn default_dimensions() -> usize {
    384
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorStoreConfig {
    #[serde(default = "default_vector_store_provider")]
    pub provider: String,
    #[serde(default = "default_vector_store_path")]
    pub path: String,
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            provider: default_vector_store_provider(),
            path: default_vector_store_path(),
            qdrant_url: default_qdrant_url(),
        }
    }
}

fn default_vector_store_provider() -> String {
    "local".to_string()
}
fn default_vector_store_path() -> String {
    "./vector_db".to_string()
}
fn default_qdrant_url() -> String {
    "http://localhost:6334".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RagConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_max_file_size() -> usize {
    50 * 1024 * 1024
}

// ──────────────────────────── Resolved Settings ────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorStoreProvider {
    Local,
    Qdrant,
}

impl std::str::FromStr for VectorStoreProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "lancedb" => Ok(Self::Local),
            "qdrant" => Ok(Self::Qdrant),
            other => bail!("unknown vector store provider: {other}"),
        }
    }
}

/// Flat settings structure resolved from TOML + environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    // API
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,

    // Service
    pub environment: String,
    pub version: String,

    // Completion
    pub groq_api_key: String,
    pub completion_base_url: String,
    pub completion_model: String,
    pub fallback_model: Option<String>,
    pub completion_params: CompletionParams,
    pub http_timeout: Duration,

    // Embedding
    pub embedding_base_url: String,
    pub embedding_model: String,
    pub embedding_api_key: Option<String>,
    pub embedding_dimensions: usize,

    // Vector store
    pub vector_store_provider: VectorStoreProvider,
    pub vector_store_path: String,
    pub qdrant_url: String,

    // RAG
    pub top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,

    // Upload
    pub max_file_size: usize,
}

/// Load `.env`, then the TOML file named by `PAPERLENS_CONFIG` (default
/// `paperlens.toml`, optional), then apply process environment overrides.
pub fn load_settings() -> anyhow::Result<Settings> {
    // Load .env if present (ignore errors)
    let _ = dotenvy::dotenv();

    let path = std::env::var("PAPERLENS_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_settings_from_path(path, |key| std::env::var(key).ok())
}

/// Load settings from a given TOML path with an injectable environment.
/// A missing file means all defaults.
pub fn load_settings_from_path(
    path: impl AsRef<Path>,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let path = path.as_ref();
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?
    } else {
        TomlConfig::default()
    };
    resolve_settings(config, env)
}

pub fn resolve_settings(
    config: TomlConfig,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    let groq_api_key = var("GROQ_API_KEY")
        .context("GROQ_API_KEY environment variable is required")?;

    let host = var("HOST").unwrap_or(config.api.host);
    let port = match var("PORT") {
        Some(p) => p.parse().with_context(|| format!("Invalid PORT: {p}"))?,
        None => config.api.port,
    };
    let cors_origins = match var("CORS_ORIGINS") {
        Some(origins) => origins
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect(),
        None => config.api.cors_origins,
    };

    let vector_store_path = var("VECTOR_STORE_PATH")
        .or_else(|| var("CHROMA_PERSIST_DIR"))
        .unwrap_or(config.vector_store.path);
    let vector_store_provider = var("VECTOR_STORE_PROVIDER")
        .unwrap_or(config.vector_store.provider)
        .parse()?;
    let qdrant_url = var("QDRANT_URL").unwrap_or(config.vector_store.qdrant_url);

    let top_k = match var("RAG_TOP_K") {
        Some(k) => k.parse().with_context(|| format!("Invalid RAG_TOP_K: {k}"))?,
        None => config.rag.top_k,
    };

    let settings = Settings {
        host,
        port,
        cors_origins,
        environment: config.service.environment,
        version: config.service.version,
        groq_api_key,
        completion_base_url: config.completion.base_url,
        completion_model: config.completion.model,
        fallback_model: config.completion.fallback_model.filter(|m| !m.is_empty()),
        completion_params: CompletionParams {
            temperature: config.completion.temperature,
            max_tokens: config.completion.max_tokens,
            top_p: config.completion.top_p,
        },
        http_timeout: Duration::from_secs(config.completion.timeout_secs),
        embedding_base_url: var("EMBEDDING_BASE_URL").unwrap_or(config.embedding.base_url),
        embedding_model: var("EMBEDDING_MODEL").unwrap_or(config.embedding.model),
        embedding_api_key: var("EMBEDDING_API_KEY"),
        embedding_dimensions: config.embedding.dimensions,
        vector_store_provider,
        vector_store_path,
        qdrant_url,
        top_k,
        chunk_size: config.rag.chunk_size,
        chunk_overlap: config.rag.chunk_overlap,
        max_file_size: config.upload.max_file_size,
    };
    settings.validate()?;
    Ok(settings)
}

impl Settings {
    fn validate(&self) -> anyhow::Result<()> {
        if self.top_k == 0 {
            bail!("rag.top_k must be greater than 0");
        }
        if self.chunk_size == 0 {
            bail!("rag.chunk_size must be greater than 0");
        }
        if self.chunk_overlap >= self.chunk_size {
            bail!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        if self.embedding_dimensions == 0 {
            bail!("embedding.dimensions must be greater than 0");
        }
        Ok(())
    }
}
