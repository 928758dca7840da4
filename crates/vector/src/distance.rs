use ndarray::ArrayView1;
use ragstore_common::{RagStoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Distance metric, fixed per collection (smaller = closer)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`; a zero vector is at distance 1 from everything
    #[default]
    Cosine,
    /// Squared Euclidean distance
    L2,
    /// `1 - a·b`
    Ip,
}

impl DistanceMetric {
    /// Distance between two equal-length vectors
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        let a = ArrayView1::from(a);
        let b = ArrayView1::from(b);

        match self {
            Self::Cosine => {
                let norm_a = a.dot(&a).sqrt();
                let norm_b = b.dot(&b).sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 1.0;
                }
                1.0 - a.dot(&b) / (norm_a * norm_b)
            }
            Self::L2 => {
                let diff = &a - &b;
                diff.dot(&diff)
            }
            Self::Ip => 1.0 - a.dot(&b),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::L2 => "l2",
            Self::Ip => "ip",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = RagStoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "l2" | "euclidean" => Ok(Self::L2),
            "ip" | "inner_product" => Ok(Self::Ip),
            other => Err(RagStoreError::invalid_input(format!("Unknown distance metric: {}", other))),
        }
    }
}
