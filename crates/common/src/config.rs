use crate::error::RagStoreError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Embedding providers understood by `ragstore-embed`
pub const EMBEDDING_PROVIDERS: &[&str] = &["hash", "ollama"];

/// Distance metrics understood by `ragstore-vector`
pub const DISTANCE_METRICS: &[&str] = &["cosine", "l2", "ip"];

/// ragstore configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Storage directory; `None` keeps everything in memory
    pub persist_directory: Option<PathBuf>,

    /// Embedding provider name (`hash` or `ollama`)
    pub embedding_provider: String,

    /// Output dimension of the hash embedder
    pub embedding_dim: usize,

    /// Ollama API base URL
    pub ollama_base_url: String,

    /// Embedding model name
    pub embedding_model: String,

    /// Upper bound for a single embedding call, in seconds
    pub embed_timeout_secs: u64,

    /// Metric for collections created without an explicit one
    pub default_metric: String,

    /// Log directory
    pub log_dir: PathBuf,

    /// Log level
    pub log_level: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            persist_directory: None,
            embedding_provider: "hash".to_string(),
            embedding_dim: 384,
            ollama_base_url: "http://localhost:11434".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            embed_timeout_secs: 60,
            default_metric: "cosine".to_string(),
            log_dir: PathBuf::from("./ragstore/log"),
            log_level: "info".to_string(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self, RagStoreError> {
        // Load .env file (ignore if not exists)
        let _ = dotenv::dotenv();

        let defaults = Self::default();
        let config = Self {
            persist_directory: Self::get_env_path("RAGSTORE_PERSIST_DIR"),
            embedding_provider: std::env::var("RAGSTORE_EMBEDDING_PROVIDER")
                .map(|s| s.to_lowercase())
                .unwrap_or(defaults.embedding_provider),
            embedding_dim: Self::get_env_parsed("RAGSTORE_EMBEDDING_DIM")?
                .unwrap_or(defaults.embedding_dim),
            ollama_base_url: std::env::var("OLLAMA_BASE_URL")
                .unwrap_or(defaults.ollama_base_url),
            embedding_model: std::env::var("EMBEDDING_MODEL")
                .unwrap_or(defaults.embedding_model),
            embed_timeout_secs: Self::get_env_parsed("RAGSTORE_EMBED_TIMEOUT_SECS")?
                .unwrap_or(defaults.embed_timeout_secs),
            default_metric: std::env::var("RAGSTORE_DEFAULT_METRIC")
                .map(|s| s.to_lowercase())
                .unwrap_or(defaults.default_metric),
            log_dir: Self::get_env_path("LOG_DIR").unwrap_or(defaults.log_dir),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
        };

        config.validate()?;
        Ok(config)
    }

    /// Get PathBuf from environment variable
    fn get_env_path(key: &str) -> Option<PathBuf> {
        std::env::var(key)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
    }

    /// Parse a numeric environment variable; a present but malformed value is an error
    fn get_env_parsed<T: std::str::FromStr>(key: &str) -> Result<Option<T>, RagStoreError> {
        match std::env::var(key) {
            Ok(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| RagStoreError::config(format!("{} is not a valid number: {}", key, raw))),
            Err(_) => Ok(None),
        }
    }

    /// Embedding call timeout
    pub fn embed_timeout(&self) -> Duration {
        Duration::from_secs(self.embed_timeout_secs)
    }

    /// Whether collections are flushed to disk
    pub fn is_persistent(&self) -> bool {
        self.persist_directory.is_some()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), RagStoreError> {
        if !EMBEDDING_PROVIDERS.contains(&self.embedding_provider.as_str()) {
            return Err(RagStoreError::config(format!(
                "Unknown embedding provider '{}' (expected one of {:?})",
                self.embedding_provider, EMBEDDING_PROVIDERS
            )));
        }

        if !DISTANCE_METRICS.contains(&self.default_metric.as_str()) {
            return Err(RagStoreError::config(format!(
                "Unknown distance metric '{}' (expected one of {:?})",
                self.default_metric, DISTANCE_METRICS
            )));
        }

        if self.embedding_dim == 0 {
            return Err(RagStoreError::config("Embedding dimension cannot be 0"));
        }

        if self.embed_timeout_secs == 0 {
            return Err(RagStoreError::config("Embedding timeout cannot be 0"));
        }

        // Validate Ollama URL
        if !self.ollama_base_url.starts_with("http://")
            && !self.ollama_base_url.starts_with("https://") {
            return Err(RagStoreError::config(
                "Ollama base URL must start with http:// or https://"
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.embedding_provider, "hash");
        assert_eq!(config.embedding_dim, 384);
        assert!(!config.is_persistent());
        assert_eq!(config.embed_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_validate() {
        let config = StoreConfig::default();
        assert!(config.validate().is_ok());

        let mut invalid_config = StoreConfig::default();
        invalid_config.embedding_provider = "openai".to_string();
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = StoreConfig::default();
        invalid_config.default_metric = "manhattan".to_string();
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = StoreConfig::default();
        invalid_config.ollama_base_url = "localhost:11434".to_string();
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = StoreConfig::default();
        invalid_config.embedding_dim = 0;
        assert!(invalid_config.validate().is_err());
    }
}
