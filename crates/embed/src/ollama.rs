use async_trait::async_trait;
use ragstore_common::{RagStoreError, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::embedding_trait::EmbeddingFunction;
use crate::types::{EmbedRequest, EmbedResponse};

const DEFAULT_MAX_RETRIES: u32 = 3;

/// Embedding adapter backed by an Ollama server
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    name: String,
    client: Client,
    max_retries: u32,
}

impl OllamaEmbedder {
    /// Create new Ollama embedder
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, model, Duration::from_secs(60))
    }

    /// Create new Ollama embedder with a per-request HTTP timeout
    pub fn with_timeout(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let model = model.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagStoreError::config(format!("Failed to create HTTP client: {}", e)))?;

        info!("Ollama embedder initialized: {} ({})", base_url, model);
        Ok(Self {
            name: format!("ollama:{}", model),
            base_url,
            model,
            client,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Override the retry count (minimum one attempt)
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Model name sent to the server
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Test connection to Ollama
    pub async fn test_connection(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RagStoreError::embedding(format!("Failed to connect to Ollama: {}", e)))?;
        Ok(response.status().is_success())
    }

    /// Embed one text, retrying with exponential backoff
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let request = EmbedRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        debug!("Generating embedding - Model: {}, Text length: {}", self.model, text.len());

        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            match self.try_embed(&url, &request).await {
                Ok(embedding) => {
                    debug!("Received embedding - Dimension: {}", embedding.len());
                    return Ok(embedding);
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        let delay = Duration::from_secs(2u64.pow(attempt - 1));
                        warn!(
                            "Embedding request failed (attempt {}/{}): {}. Retrying in {:?}...",
                            attempt,
                            self.max_retries,
                            e,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| RagStoreError::embedding("All retries failed")))
    }

    /// Single attempt to generate embedding
    async fn try_embed(&self, url: &str, request: &EmbedRequest) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| RagStoreError::embedding(format!("Failed to send embedding request: {}", e)))?
            .error_for_status()
            .map_err(|e| RagStoreError::embedding(format!("Ollama embedding API error: {}", e)))?;

        let result: EmbedResponse = response
            .json()
            .await
            .map_err(|e| RagStoreError::embedding(format!("Failed to parse embedding response: {}", e)))?;

        if result.embedding.is_empty() {
            return Err(RagStoreError::embedding("Empty embedding from Ollama"));
        }

        Ok(result.embedding)
    }
}

#[async_trait]
impl EmbeddingFunction for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed_one(text).await?);
        }
        Ok(embeddings)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
