//! Deterministic feature-hashing embedder
//!
//! Not semantic: texts sharing words or character trigrams end up close,
//! synonyms do not. Useful as a dependency-free default, for tests, and for
//! demos that run without a model server.

use async_trait::async_trait;
use ragstore_common::{RagStoreError, Result};
use sha2::{Digest, Sha256};

use crate::embedding_trait::EmbeddingFunction;

/// Default output dimension
pub const DEFAULT_HASH_DIM: usize = 384;

/// Word features weigh more than character trigrams
const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Feature-hashing embedder over lower-cased words and character trigrams
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
    name: String,
}

impl HashEmbedder {
    /// Create a hash embedder producing `dimension`-length vectors
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RagStoreError::invalid_input("Hash embedder dimension cannot be 0"));
        }
        Ok(Self {
            dimension,
            name: format!("hash:{}", dimension),
        })
    }

    /// Output dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed a single text
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        let lowered = text.to_lowercase();
        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            self.accumulate(&mut vector, b"w:", word, WORD_WEIGHT);

            let chars: Vec<char> = format!(" {} ", word).chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                self.accumulate(&mut vector, b"t:", &trigram, TRIGRAM_WEIGHT);
            }
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }

    fn accumulate(&self, vector: &mut [f32], prefix: &[u8], feature: &str, weight: f32) {
        let digest = Sha256::new()
            .chain_update(prefix)
            .chain_update(feature.as_bytes())
            .finalize();

        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };

        vector[bucket] += sign * weight;
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_HASH_DIM,
            name: format!("hash:{}", DEFAULT_HASH_DIM),
        }
    }
}

#[async_trait]
impl EmbeddingFunction for HashEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_deterministic() {
        let embedder = HashEmbedder::new(64).unwrap();
        assert_eq!(embedder.embed_text("Livre Python"), embedder.embed_text("Livre Python"));
    }

    #[test]
    fn test_normalized_and_sized() {
        let embedder = HashEmbedder::default();
        let v = embedder.embed_text("Salut, les amis de la Data !");
        assert_eq!(v.len(), DEFAULT_HASH_DIM);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashEmbedder::new(16).unwrap();
        assert!(embedder.embed_text("  ,, ").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_shared_words_are_closer() {
        let embedder = HashEmbedder::default();
        let query = embedder.embed_text("population de la Chine");
        let china = embedder.embed_text("Country: China, Population: 1411750000");
        let cars = embedder.embed_text("BMW RAV4 DavRos");
        assert!(cosine(&query, &china) > cosine(&query, &cars));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(HashEmbedder::new(0).is_err());
    }

    #[tokio::test]
    async fn test_batch_embed() {
        let embedder = HashEmbedder::new(32).unwrap();
        let texts = vec!["a b".to_string(), "c".to_string()];
        let vectors = embedder.embed(&texts).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert!(vectors.iter().all(|v| v.len() == 32));
        assert_eq!(embedder.name(), "hash:32");
    }
}
