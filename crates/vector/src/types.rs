use ragstore_common::{RagStoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Embedding vector
pub type Embedding = Vec<f32>;

/// Document or collection metadata
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Scalar metadata value
///
/// Serialized untagged, so metadata maps read and write as plain JSON
/// objects (`{"categorie": "IA", "annee": 2024}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl MetadataValue {
    /// False only for NaN and infinite floats, which JSON cannot represent
    pub fn is_finite(&self) -> bool {
        !matches!(self, Self::Float(f) if !f.is_finite())
    }

    /// Numeric view, for ordering comparisons and int/float equality
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Equality with int/float values compared numerically
    pub fn loosely_equals(&self, other: &MetadataValue) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Convert a JSON scalar; `None` for null, arrays and objects
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            serde_json::Value::String(s) => Some(Self::Str(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for MetadataValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// Build a [`Metadata`] map from `(key, value)` pairs
pub fn metadata<K, V, I>(pairs: I) -> Metadata
where
    K: Into<String>,
    V: Into<MetadataValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

/// Reject metadata that could not be written to a snapshot
pub(crate) fn check_metadata(metadata: &Metadata) -> Result<()> {
    match metadata.iter().find(|(_, v)| !v.is_finite()) {
        Some((key, value)) => Err(RagStoreError::invalid_input(format!(
            "Metadata value for {} must be finite, got {}",
            key, value
        ))),
        None => Ok(()),
    }
}

/// Reject vectors containing NaN or infinite components
pub(crate) fn check_embedding(embedding: &[f32]) -> Result<()> {
    match embedding.iter().position(|x| !x.is_finite()) {
        Some(i) => Err(RagStoreError::invalid_input(format!(
            "Embedding component {} is not finite ({})",
            i, embedding[i]
        ))),
        None => Ok(()),
    }
}

/// Stored document (text and metadata; the vector lives in the index)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document ID
    pub id: String,

    /// Raw text
    #[serde(default)]
    pub text: Option<String>,

    /// Document metadata
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// Fields returned by `get` / `query`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Include {
    Documents,
    Metadatas,
    Embeddings,
    Distances,
}

impl Include {
    /// Default field set for `get`
    pub fn get_default() -> Vec<Include> {
        vec![Include::Documents, Include::Metadatas]
    }

    /// Default field set for `query`
    pub fn query_default() -> Vec<Include> {
        vec![Include::Documents, Include::Metadatas, Include::Distances]
    }
}

/// Result of `get` / `peek`
///
/// Field vectors are parallel to `ids`; a field not requested through
/// `include` is `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GetResult {
    pub ids: Vec<String>,
    pub documents: Option<Vec<Option<String>>>,
    pub metadatas: Option<Vec<Option<Metadata>>>,
    pub embeddings: Option<Vec<Embedding>>,
}

impl GetResult {
    /// Number of returned documents
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// No documents matched
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Result of `query`, grouped per input query
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub ids: Vec<Vec<String>>,
    pub distances: Option<Vec<Vec<f32>>>,
    pub documents: Option<Vec<Vec<Option<String>>>>,
    pub metadatas: Option<Vec<Vec<Option<Metadata>>>>,
    pub embeddings: Option<Vec<Vec<Embedding>>>,
}

impl QueryResult {
    /// Best match of the first query, if any
    pub fn first_id(&self) -> Option<&str> {
        self.ids.first().and_then(|ids| ids.first()).map(String::as_str)
    }
}
