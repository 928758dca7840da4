//! ragstore embedding adapters
//!
//! The [`EmbeddingFunction`] trait plus the built-in providers: a local
//! feature-hashing embedder (default) and an Ollama HTTP client.

mod embedding_trait;
mod hash;
mod ollama;
mod types;

pub use embedding_trait::EmbeddingFunction;
pub use hash::{HashEmbedder, DEFAULT_HASH_DIM};
pub use ollama::OllamaEmbedder;
pub use types::{EmbedRequest, EmbedResponse};

use ragstore_common::{RagStoreError, Result, StoreConfig};
use std::sync::Arc;

/// Build the embedder selected by `config.embedding_provider`
pub fn from_config(config: &StoreConfig) -> Result<Arc<dyn EmbeddingFunction>> {
    match config.embedding_provider.as_str() {
        "hash" => Ok(Arc::new(HashEmbedder::new(config.embedding_dim)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::with_timeout(
            config.ollama_base_url.clone(),
            config.embedding_model.clone(),
            config.embed_timeout(),
        )?)),
        other => Err(RagStoreError::config(format!("Unknown embedding provider '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_default_is_hash() {
        let embedder = from_config(&StoreConfig::default()).unwrap();
        assert_eq!(embedder.name(), "hash:384");
    }

    #[test]
    fn test_from_config_ollama() {
        let mut config = StoreConfig::default();
        config.embedding_provider = "ollama".to_string();
        let embedder = from_config(&config).unwrap();
        assert_eq!(embedder.name(), "ollama:nomic-embed-text");
    }

    #[test]
    fn test_from_config_unknown() {
        let mut config = StoreConfig::default();
        config.embedding_provider = "nope".to_string();
        assert!(from_config(&config).is_err());
    }
}
