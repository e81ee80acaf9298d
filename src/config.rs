//! TOML configuration parsing and validation.
//!
//! Every section has defaults, so an empty file (or no file at all) yields a
//! runnable in-memory lexical server. The shared API secret is never read
//! from the file itself; `[auth].api_key_env` names the environment variable
//! that holds it.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use docstore_core::{DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/docstore.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// `"memory"` or `"sqlite"`.
    #[serde(default = "default_store_backend")]
    pub backend: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
        }
    }
}

fn default_store_backend() -> String {
    "memory".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// `"lexical"` or `"vector"`.
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    /// Deadline for a single call into the retrieval collaborator.
    #[serde(default = "default_retrieval_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            timeout_secs: default_retrieval_timeout_secs(),
        }
    }
}

fn default_strategy() -> String {
    "lexical".to_string()
}
fn default_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}
fn default_max_limit() -> usize {
    MAX_SEARCH_LIMIT
}
fn default_retrieval_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: 0,
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:10000".to_string()
}
fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Environment variable holding the shared bearer secret.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_api_key_env() -> String {
    "API_KEY".to_string()
}

impl AuthConfig {
    /// Read the shared secret from the environment, if set.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
    }
}

/// Load and validate a config file.
///
/// When `path` does not exist and `allow_missing` is set, built-in defaults
/// are used instead. `PORT` in the environment overrides the bind port.
pub fn load_config(path: &Path, allow_missing: bool) -> Result<Config> {
    let mut config = if allow_missing && !path.exists() {
        Config::default()
    } else {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config(&content)?
    };

    if let Ok(port) = std::env::var("PORT") {
        let port: u16 = port
            .parse()
            .with_context(|| format!("PORT must be a valid port number, got '{}'", port))?;
        config.server.bind = with_port(&config.server.bind, port);
    }

    validate(&config)?;
    Ok(config)
}

/// Parse a config from TOML text without touching the environment.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn with_port(bind: &str, port: u16) -> String {
    let host = bind.rsplit_once(':').map(|(h, _)| h).unwrap_or("0.0.0.0");
    format!("{}:{}", host, port)
}

fn validate(config: &Config) -> Result<()> {
    match config.store.backend.as_str() {
        "memory" | "sqlite" => {}
        other => bail!(
            "Unknown store backend: '{}'. Must be memory or sqlite.",
            other
        ),
    }

    match config.retrieval.strategy.as_str() {
        "lexical" => {}
        "vector" => {
            if config.store.backend != "sqlite" {
                bail!("retrieval.strategy = 'vector' requires store.backend = 'sqlite'");
            }
        }
        other => bail!(
            "Unknown retrieval strategy: '{}'. Must be lexical or vector.",
            other
        ),
    }

    if !(1..=MAX_SEARCH_LIMIT).contains(&config.retrieval.max_limit) {
        bail!("retrieval.max_limit must be in [1, {}]", MAX_SEARCH_LIMIT);
    }
    if !(1..=config.retrieval.max_limit).contains(&config.retrieval.default_limit) {
        bail!("retrieval.default_limit must be in [1, retrieval.max_limit]");
    }
    if config.retrieval.timeout_secs == 0 {
        bail!("retrieval.timeout_secs must be > 0");
    }
    if config.server.request_timeout_secs == 0 {
        bail!("server.request_timeout_secs must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    Ok(())
}
