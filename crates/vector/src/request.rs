use ragstore_common::{RagStoreError, Result};
use std::collections::HashSet;

use crate::filter::{Where, WhereDocument};
use crate::types::{check_embedding, check_metadata, Embedding, Include, Metadata};

/// Batch for `add` / `upsert`
#[derive(Debug, Clone, Default)]
pub struct AddRequest {
    pub ids: Vec<String>,
    pub documents: Option<Vec<String>>,
    pub embeddings: Option<Vec<Embedding>>,
    pub metadatas: Option<Vec<Metadata>>,
}

impl AddRequest {
    pub fn new<S: Into<String>>(ids: impl IntoIterator<Item = S>) -> Self {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn documents<S: Into<String>>(mut self, documents: impl IntoIterator<Item = S>) -> Self {
        self.documents = Some(documents.into_iter().map(Into::into).collect());
        self
    }

    pub fn embeddings(mut self, embeddings: Vec<Embedding>) -> Self {
        self.embeddings = Some(embeddings);
        self
    }

    pub fn metadatas(mut self, metadatas: Vec<Metadata>) -> Self {
        self.metadatas = Some(metadatas);
        self
    }

    /// Shape checks that need no collection state
    pub(crate) fn validate(&self) -> Result<()> {
        validate_ids(&self.ids)?;
        check_len("documents", self.documents.as_ref().map(Vec::len), self.ids.len())?;
        check_len("embeddings", self.embeddings.as_ref().map(Vec::len), self.ids.len())?;
        check_len("metadatas", self.metadatas.as_ref().map(Vec::len), self.ids.len())?;
        check_values(self.embeddings.as_deref(), self.metadatas.as_deref())?;

        if self.documents.is_none() && self.embeddings.is_none() {
            return Err(RagStoreError::invalid_input(
                "Each document needs a text or an embedding",
            ));
        }
        Ok(())
    }
}

/// Partial update of existing documents
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    pub ids: Vec<String>,
    pub documents: Option<Vec<String>>,
    pub embeddings: Option<Vec<Embedding>>,
    pub metadatas: Option<Vec<Metadata>>,
}

impl UpdateRequest {
    pub fn new<S: Into<String>>(ids: impl IntoIterator<Item = S>) -> Self {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn documents<S: Into<String>>(mut self, documents: impl IntoIterator<Item = S>) -> Self {
        self.documents = Some(documents.into_iter().map(Into::into).collect());
        self
    }

    pub fn embeddings(mut self, embeddings: Vec<Embedding>) -> Self {
        self.embeddings = Some(embeddings);
        self
    }

    /// Merged key-by-key into the stored metadata
    pub fn metadatas(mut self, metadatas: Vec<Metadata>) -> Self {
        self.metadatas = Some(metadatas);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        validate_ids(&self.ids)?;
        check_len("documents", self.documents.as_ref().map(Vec::len), self.ids.len())?;
        check_len("embeddings", self.embeddings.as_ref().map(Vec::len), self.ids.len())?;
        check_len("metadatas", self.metadatas.as_ref().map(Vec::len), self.ids.len())?;
        check_values(self.embeddings.as_deref(), self.metadatas.as_deref())
    }
}

/// Selection for `get`
#[derive(Debug, Clone, Default)]
pub struct GetRequest {
    pub ids: Option<Vec<String>>,
    pub where_: Option<Where>,
    pub where_document: Option<WhereDocument>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub include: Option<Vec<Include>>,
}

impl GetRequest {
    /// Everything, default fields
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids<S: Into<String>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn where_(mut self, selector: Where) -> Self {
        self.where_ = Some(selector);
        self
    }

    pub fn where_document(mut self, selector: WhereDocument) -> Self {
        self.where_document = Some(selector);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn include(mut self, include: Vec<Include>) -> Self {
        self.include = Some(include);
        self
    }
}

/// Query input: texts are embedded, embeddings are used as-is
#[derive(Debug, Clone)]
pub enum QueryInput {
    Texts(Vec<String>),
    Embeddings(Vec<Embedding>),
}

/// Nearest-neighbour query
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub input: QueryInput,
    pub n_results: usize,
    pub where_: Option<Where>,
    pub where_document: Option<WhereDocument>,
    pub include: Option<Vec<Include>>,
}

impl QueryRequest {
    /// Query by text (10 results by default)
    pub fn texts<S: Into<String>>(texts: impl IntoIterator<Item = S>) -> Self {
        Self::with_input(QueryInput::Texts(texts.into_iter().map(Into::into).collect()))
    }

    /// Query by precomputed embeddings
    pub fn embeddings(embeddings: Vec<Embedding>) -> Self {
        Self::with_input(QueryInput::Embeddings(embeddings))
    }

    fn with_input(input: QueryInput) -> Self {
        Self {
            input,
            n_results: 10,
            where_: None,
            where_document: None,
            include: None,
        }
    }

    pub fn n_results(mut self, n_results: usize) -> Self {
        self.n_results = n_results;
        self
    }

    pub fn where_(mut self, selector: Where) -> Self {
        self.where_ = Some(selector);
        self
    }

    pub fn where_document(mut self, selector: WhereDocument) -> Self {
        self.where_document = Some(selector);
        self
    }

    pub fn include(mut self, include: Vec<Include>) -> Self {
        self.include = Some(include);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.n_results == 0 {
            return Err(RagStoreError::invalid_input("n_results must be at least 1"));
        }
        let empty = match &self.input {
            QueryInput::Texts(t) => t.is_empty(),
            QueryInput::Embeddings(e) => e.is_empty(),
        };
        if empty {
            return Err(RagStoreError::invalid_input("Query needs at least one text or embedding"));
        }
        if let QueryInput::Embeddings(embeddings) = &self.input {
            embeddings.iter().try_for_each(|e| check_embedding(e))?;
        }
        Ok(())
    }
}

/// Selection for `delete`; at least one selector is required
#[derive(Debug, Clone, Default)]
pub struct DeleteRequest {
    pub ids: Option<Vec<String>>,
    pub where_: Option<Where>,
    pub where_document: Option<WhereDocument>,
}

impl DeleteRequest {
    pub fn ids<S: Into<String>>(ids: impl IntoIterator<Item = S>) -> Self {
        Self {
            ids: Some(ids.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    pub fn matching(selector: Where) -> Self {
        Self {
            where_: Some(selector),
            ..Default::default()
        }
    }

    pub fn matching_document(selector: WhereDocument) -> Self {
        Self {
            where_document: Some(selector),
            ..Default::default()
        }
    }

    pub fn where_(mut self, selector: Where) -> Self {
        self.where_ = Some(selector);
        self
    }

    pub fn where_document(mut self, selector: WhereDocument) -> Self {
        self.where_document = Some(selector);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.ids.is_none() && self.where_.is_none() && self.where_document.is_none() {
            return Err(RagStoreError::invalid_selector(
                "delete needs ids, where or where_document",
            ));
        }
        Ok(())
    }
}

fn validate_ids(ids: &[String]) -> Result<()> {
    if ids.is_empty() {
        return Err(RagStoreError::invalid_input("ids cannot be empty"));
    }
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if id.is_empty() {
            return Err(RagStoreError::invalid_input("ids cannot contain an empty string"));
        }
        if !seen.insert(id.as_str()) {
            return Err(RagStoreError::duplicate_id(id.clone()));
        }
    }
    Ok(())
}

fn check_values(embeddings: Option<&[Embedding]>, metadatas: Option<&[Metadata]>) -> Result<()> {
    embeddings
        .unwrap_or_default()
        .iter()
        .try_for_each(|e| check_embedding(e))?;
    metadatas.unwrap_or_default().iter().try_for_each(check_metadata)
}

fn check_len(field: &str, len: Option<usize>, expected: usize) -> Result<()> {
    match len {
        Some(len) if len != expected => Err(RagStoreError::invalid_input(format!(
            "{} has {} entries for {} ids",
            field, len, expected
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_needs_text_or_embedding() {
        assert!(AddRequest::new(["a"]).validate().is_err());
        assert!(AddRequest::new(["a"]).documents(["x"]).validate().is_ok());
        assert!(AddRequest::new(["a"]).embeddings(vec![vec![1.0]]).validate().is_ok());
    }

    #[test]
    fn test_length_mismatch() {
        let err = AddRequest::new(["a", "b"]).documents(["x"]).validate().unwrap_err();
        assert_eq!(err.code(), "InvalidInput");
    }

    #[test]
    fn test_duplicate_in_batch() {
        let err = AddRequest::new(["a", "a"]).documents(["x", "y"]).validate().unwrap_err();
        assert_eq!(err.code(), "DuplicateId");
    }

    #[test]
    fn test_non_finite_values() {
        let err = AddRequest::new(["a"])
            .embeddings(vec![vec![f32::NAN, 1.0]])
            .validate()
            .unwrap_err();
        assert_eq!(err.code(), "InvalidInput");

        let err = UpdateRequest::new(["a"])
            .metadatas(vec![crate::types::metadata([("score", f64::INFINITY)])])
            .validate()
            .unwrap_err();
        assert_eq!(err.code(), "InvalidInput");

        let err = QueryRequest::embeddings(vec![vec![f32::INFINITY]]).validate().unwrap_err();
        assert_eq!(err.code(), "InvalidInput");
    }

    #[test]
    fn test_delete_needs_selector() {
        assert_eq!(DeleteRequest::default().validate().unwrap_err().code(), "InvalidSelector");
        assert!(DeleteRequest::ids(["a"]).validate().is_ok());
    }

    #[test]
    fn test_query_validation() {
        assert!(QueryRequest::texts(["x"]).n_results(0).validate().is_err());
        assert!(QueryRequest::texts(Vec::<String>::new()).validate().is_err());
        assert!(QueryRequest::embeddings(vec![vec![0.1]]).n_results(3).validate().is_ok());
    }
}
