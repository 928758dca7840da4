//! Embedders for unit tests.

use async_trait::async_trait;
use ragstore_common::{RagStoreError, Result};
use ragstore_embed::EmbeddingFunction;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One axis per keyword group; "cat" and "feline" share an axis, "dog" and "puppy" another
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
}

const GROUPS: &[&[&str]] = &[
    &["cat", "feline", "kitten"],
    &["dog", "puppy", "canine"],
    &["car", "voiture", "bmw"],
];

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self { calls: AtomicUsize::new(0) }
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let lowered = text.to_lowercase();
        let mut v = vec![0.0f32; GROUPS.len() + 1];
        for (axis, words) in GROUPS.iter().enumerate() {
            if words.iter().any(|w| lowered.contains(w)) {
                v[axis] = 1.0;
            }
        }
        // keep unknown texts off the origin
        v[GROUPS.len()] = 0.1;
        v
    }
}

#[async_trait]
impl EmbeddingFunction for KeywordEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Always fails
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingFunction for FailingEmbedder {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(RagStoreError::invalid_input("model unavailable"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Sleeps before answering
pub struct SlowEmbedder(pub Duration);

#[async_trait]
impl EmbeddingFunction for SlowEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        tokio::time::sleep(self.0).await;
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }

    fn name(&self) -> &str {
        "slow"
    }
}

/// Returns one vector too few
pub struct ShortEmbedder;

#[async_trait]
impl EmbeddingFunction for ShortEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().skip(1).map(|_| vec![1.0]).collect())
    }

    fn name(&self) -> &str {
        "short"
    }
}
