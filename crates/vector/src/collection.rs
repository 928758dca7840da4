use chrono::{DateTime, Utc};
use ragstore_common::{RagStoreError, Result};
use ragstore_embed::EmbeddingFunction;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock as StdRwLock};
use std::time::Duration;
use tokio::sync::{RwLock, RwLockWriteGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::distance::DistanceMetric;
use crate::index::VectorIndex;
use crate::persistence::Storage;
use crate::request::{AddRequest, DeleteRequest, GetRequest, QueryInput, QueryRequest, UpdateRequest};
use crate::store::DocumentStore;
use crate::types::{check_metadata, Document, Embedding, GetResult, Include, Metadata, QueryResult};

/// Default `peek` size
pub const DEFAULT_PEEK_LIMIT: usize = 10;

/// Everything a collection owns; also the on-disk snapshot format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CollectionState {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    pub created_at: DateTime<Utc>,
    /// Name of the embedder that produced the stored text vectors
    #[serde(default)]
    pub embedder: Option<String>,
    pub store: DocumentStore,
    pub index: VectorIndex,
}

impl CollectionState {
    pub fn new(name: &str, metadata: Option<Metadata>, metric: DistanceMetric) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            metadata,
            created_at: Utc::now(),
            embedder: None,
            store: DocumentStore::new(),
            index: VectorIndex::new(metric),
        }
    }

    /// Texts may only be embedded by the embedder that produced the stored vectors
    pub fn check_embedder(&self, name: &str) -> Result<()> {
        match &self.embedder {
            Some(stored) if stored != name && !self.store.is_empty() => Err(RagStoreError::embedding(format!(
                "Collection '{}' was embedded with {}, bound embedder is {}",
                self.name, stored, name
            ))),
            _ => Ok(()),
        }
    }

    /// Document store and vector index must hold the same ids
    pub fn validate(&self) -> Result<()> {
        if self.store.len() != self.index.len() {
            return Err(RagStoreError::persistence(format!(
                "{} documents but {} vectors",
                self.store.len(),
                self.index.len()
            )));
        }
        if let Some(doc) = self.store.list(None, None).into_iter().find(|d| !self.index.contains(&d.id)) {
            return Err(RagStoreError::persistence(format!("Document {} has no vector", doc.id)));
        }
        Ok(())
    }
}

/// Collection summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionInfo {
    pub id: Uuid,
    pub name: String,
    pub metadata: Option<Metadata>,
    pub metric: DistanceMetric,
    pub embedder: Option<String>,
    pub dimension: Option<usize>,
    pub count: usize,
    pub created_at: DateTime<Utc>,
}

/// Named set of documents with one dimension and one distance metric
///
/// Handles are shared (`Arc<Collection>`). Mutations are serialized per
/// collection and applied to a private copy of the state, which is flushed
/// (persistent clients) and then swapped in, so readers never see a partial
/// write and a failed call changes nothing. After the collection is deleted
/// from its client every operation fails with `NotFound`.
pub struct Collection {
    id: Uuid,
    name: String,
    embedder: StdRwLock<Arc<dyn EmbeddingFunction>>,
    embed_timeout: Duration,
    storage: Option<Storage>,
    state: RwLock<Option<CollectionState>>,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("embedder", &self.embedder_name())
            .finish()
    }
}

impl Collection {
    pub(crate) fn from_state(
        state: CollectionState,
        embedder: Arc<dyn EmbeddingFunction>,
        embed_timeout: Duration,
        storage: Option<Storage>,
    ) -> Self {
        if let Some(stored) = state.embedder.as_deref().filter(|s| *s != embedder.name()) {
            warn!(
                "Collection '{}' was embedded with {} but is bound to {}; text operations fail until the original embedder is bound",
                state.name,
                stored,
                embedder.name()
            );
        }
        Self {
            id: state.id,
            name: state.name.clone(),
            embedder: StdRwLock::new(embedder),
            embed_timeout,
            storage,
            state: RwLock::new(Some(state)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the embedding adapter in use
    pub fn embedder_name(&self) -> String {
        self.embedder().name().to_string()
    }

    fn embedder(&self) -> Arc<dyn EmbeddingFunction> {
        self.embedder.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Bind an embedding adapter to this collection
    ///
    /// Switching to a differently named embedder is only allowed while the
    /// collection holds no documents; the new name is persisted.
    pub(crate) async fn bind_embedder(&self, embedder: Arc<dyn EmbeddingFunction>) -> Result<()> {
        let name = embedder.name().to_string();
        let mut guard = self.state.write().await;
        let state = self.live(&guard)?;

        if state.embedder.as_deref() != Some(name.as_str()) {
            state.check_embedder(&name)?;
            let mut next = state.clone();
            next.embedder = Some(name.clone());
            self.commit(&mut guard, next).await?;
        }
        *self.embedder.write().unwrap_or_else(PoisonError::into_inner) = embedder;

        debug!("Collection '{}' bound to {}", self.name, name);
        Ok(())
    }

    /// Collection-level metadata
    pub async fn metadata(&self) -> Result<Option<Metadata>> {
        let guard = self.state.read().await;
        Ok(self.live(&guard)?.metadata.clone())
    }

    /// Summary of the collection
    pub async fn info(&self) -> Result<CollectionInfo> {
        let guard = self.state.read().await;
        let state = self.live(&guard)?;
        Ok(CollectionInfo {
            id: state.id,
            name: state.name.clone(),
            metadata: state.metadata.clone(),
            metric: state.index.metric(),
            embedder: state.embedder.clone(),
            dimension: state.index.dimension(),
            count: state.store.len(),
            created_at: state.created_at,
        })
    }

    /// Number of live documents
    pub async fn count(&self) -> Result<usize> {
        let guard = self.state.read().await;
        Ok(self.live(&guard)?.store.len())
    }

    /// Add new documents; fails with `DuplicateId` if any id exists
    pub async fn add(&self, request: AddRequest) -> Result<()> {
        request.validate()?;

        // fail fast before paying for embeddings
        {
            let guard = self.state.read().await;
            let state = self.live(&guard)?;
            Self::ensure_absent(state, &request.ids)?;
        }

        let (embeddings, embedded_by) = self.resolve_embeddings(&request).await?;

        let mut guard = self.state.write().await;
        let mut next = self.live(&guard)?.clone();
        Self::ensure_absent(&next, &request.ids)?;
        Self::stamp_embedder(&mut next, embedded_by)?;
        Self::write_batch(&mut next, &request, embeddings)?;
        self.commit(&mut guard, next).await?;

        info!("Added {} documents to '{}'", request.ids.len(), self.name);
        Ok(())
    }

    /// Insert new ids, overwrite existing ones with exactly the supplied fields
    pub async fn upsert(&self, request: AddRequest) -> Result<()> {
        request.validate()?;
        let (embeddings, embedded_by) = self.resolve_embeddings(&request).await?;

        let mut guard = self.state.write().await;
        let mut next = self.live(&guard)?.clone();
        let existing = request.ids.iter().filter(|id| next.store.contains(id)).count();
        Self::stamp_embedder(&mut next, embedded_by)?;
        Self::write_batch(&mut next, &request, embeddings)?;
        self.commit(&mut guard, next).await?;

        info!(
            "Upserted {} documents into '{}' ({} overwritten)",
            request.ids.len(),
            self.name,
            existing
        );
        Ok(())
    }

    /// Update existing documents; fails with `NotFound` if any id is missing
    ///
    /// Supplied texts and embeddings replace the stored ones, metadata is
    /// merged key by key. A new text without an embedding is re-embedded.
    pub async fn update(&self, request: UpdateRequest) -> Result<()> {
        request.validate()?;

        {
            let guard = self.state.read().await;
            Self::ensure_present(self.live(&guard)?, &request.ids)?;
        }

        let (embeddings, embedded_by) = match (&request.embeddings, &request.documents) {
            (Some(embeddings), _) => (Some(embeddings.clone()), None),
            (None, Some(documents)) => {
                let (embeddings, name) = self.embed_texts(documents).await?;
                (Some(embeddings), Some(name))
            }
            (None, None) => (None, None),
        };

        let mut guard = self.state.write().await;
        let mut next = self.live(&guard)?.clone();
        Self::ensure_present(&next, &request.ids)?;
        Self::stamp_embedder(&mut next, embedded_by)?;

        for (i, id) in request.ids.iter().enumerate() {
            let mut doc = next
                .store
                .get(id)
                .cloned()
                .ok_or_else(|| RagStoreError::not_found(format!("Document {}", id)))?;

            if let Some(documents) = &request.documents {
                doc.text = Some(documents[i].clone());
            }
            if let Some(metadatas) = &request.metadatas {
                doc.metadata
                    .get_or_insert_with(Metadata::new)
                    .extend(metadatas[i].clone());
            }
            if let Some(embeddings) = &embeddings {
                next.index.insert(id, embeddings[i].clone())?;
            }
            next.store.put(doc);
        }
        self.commit(&mut guard, next).await?;

        info!("Updated {} documents in '{}'", request.ids.len(), self.name);
        Ok(())
    }

    /// Delete matching documents; returns the removed ids
    pub async fn delete(&self, request: DeleteRequest) -> Result<Vec<String>> {
        request.validate()?;

        let mut guard = self.state.write().await;
        let state = self.live(&guard)?;
        let ids = Self::select(
            state,
            request.ids.as_deref(),
            request.where_.as_ref(),
            request.where_document.as_ref(),
        );
        let ids: Vec<String> = ids.into_iter().map(|d| d.id.clone()).collect();

        if ids.is_empty() {
            debug!("Delete on '{}' matched nothing", self.name);
            return Ok(ids);
        }

        let mut next = state.clone();
        for id in &ids {
            next.store.delete(id);
            next.index.remove(id);
        }
        self.commit(&mut guard, next).await?;

        info!("Deleted {} documents from '{}'", ids.len(), self.name);
        Ok(ids)
    }

    /// Fetch documents matching every supplied selector, in insertion order
    pub async fn get(&self, request: GetRequest) -> Result<GetResult> {
        let include = request.include.clone().unwrap_or_else(Include::get_default);
        if include.contains(&Include::Distances) {
            return Err(RagStoreError::invalid_input("distances can only be included in query"));
        }

        let guard = self.state.read().await;
        let state = self.live(&guard)?;
        let docs: Vec<&Document> = Self::select(
            state,
            request.ids.as_deref(),
            request.where_.as_ref(),
            request.where_document.as_ref(),
        )
        .into_iter()
        .skip(request.offset.unwrap_or(0))
        .take(request.limit.unwrap_or(usize::MAX))
        .collect();

        debug!("Get on '{}' returned {} documents", self.name, docs.len());

        let mut result = GetResult {
            ids: docs.iter().map(|d| d.id.clone()).collect(),
            ..Default::default()
        };
        if include.contains(&Include::Documents) {
            result.documents = Some(docs.iter().map(|d| d.text.clone()).collect());
        }
        if include.contains(&Include::Metadatas) {
            result.metadatas = Some(docs.iter().map(|d| d.metadata.clone()).collect());
        }
        if include.contains(&Include::Embeddings) {
            let embeddings: Vec<Embedding> = docs
                .iter()
                .map(|d| Self::vector_of(state, &d.id))
                .collect::<Result<_>>()?;
            result.embeddings = Some(embeddings);
        }
        Ok(result)
    }

    /// First `limit` documents, embeddings included
    pub async fn peek(&self, limit: Option<usize>) -> Result<GetResult> {
        self.get(
            GetRequest::new()
                .limit(limit.unwrap_or(DEFAULT_PEEK_LIMIT))
                .include(vec![Include::Documents, Include::Metadatas, Include::Embeddings]),
        )
        .await
    }

    /// Nearest neighbours per query, restricted to documents passing the filters
    pub async fn query(&self, request: QueryRequest) -> Result<QueryResult> {
        request.validate()?;
        let include = request.include.clone().unwrap_or_else(Include::query_default);

        let query_embeddings = match &request.input {
            QueryInput::Texts(texts) => self.embed_texts(texts).await?.0,
            QueryInput::Embeddings(embeddings) => embeddings.clone(),
        };

        let guard = self.state.read().await;
        let state = self.live(&guard)?;

        let allowed: Option<HashSet<String>> =
            if request.where_.is_some() || request.where_document.is_some() {
                Some(
                    state
                        .store
                        .list(request.where_.as_ref(), request.where_document.as_ref())
                        .into_iter()
                        .map(|d| d.id.clone())
                        .collect(),
                )
            } else {
                None
            };

        let mut result = QueryResult::default();
        let mut distances: Vec<Vec<f32>> = Vec::new();
        let mut documents: Vec<Vec<Option<String>>> = Vec::new();
        let mut metadatas: Vec<Vec<Option<Metadata>>> = Vec::new();
        let mut embeddings: Vec<Vec<Embedding>> = Vec::new();

        for query in &query_embeddings {
            let hits = state.index.search(query, request.n_results, allowed.as_ref())?;
            let docs: Vec<&Document> = hits
                .iter()
                .map(|(id, _)| {
                    state
                        .store
                        .get(id)
                        .ok_or_else(|| RagStoreError::not_found(format!("Document {}", id)))
                })
                .collect::<Result<_>>()?;

            result.ids.push(hits.iter().map(|(id, _)| id.clone()).collect());
            distances.push(hits.iter().map(|(_, d)| *d).collect());
            documents.push(docs.iter().map(|d| d.text.clone()).collect());
            metadatas.push(docs.iter().map(|d| d.metadata.clone()).collect());
            if include.contains(&Include::Embeddings) {
                embeddings.push(
                    hits.iter()
                        .map(|(id, _)| Self::vector_of(state, id))
                        .collect::<Result<_>>()?,
                );
            }
        }

        if include.contains(&Include::Distances) {
            result.distances = Some(distances);
        }
        if include.contains(&Include::Documents) {
            result.documents = Some(documents);
        }
        if include.contains(&Include::Metadatas) {
            result.metadatas = Some(metadatas);
        }
        if include.contains(&Include::Embeddings) {
            result.embeddings = Some(embeddings);
        }

        debug!(
            "Query on '{}': {} queries, n_results={}",
            self.name,
            query_embeddings.len(),
            request.n_results
        );
        Ok(result)
    }

    /// Replace collection-level metadata
    pub async fn modify(&self, metadata: Option<Metadata>) -> Result<()> {
        if let Some(metadata) = &metadata {
            check_metadata(metadata)?;
        }
        let mut guard = self.state.write().await;
        let mut next = self.live(&guard)?.clone();
        next.metadata = metadata;
        self.commit(&mut guard, next).await?;

        info!("Modified metadata of '{}'", self.name);
        Ok(())
    }

    /// Remove the snapshot and drop both stores; the handle is unusable afterwards
    ///
    /// Runs under the state write lock, so a mutation already committing
    /// finishes its flush before the snapshot is removed.
    pub(crate) async fn drop_state(&self) -> Result<()> {
        let mut guard = self.state.write().await;
        if let Some(storage) = &self.storage {
            storage.remove(&self.name).await?;
        }
        if guard.take().is_some() {
            debug!("Dropped state of '{}'", self.name);
        }
        Ok(())
    }

    fn live<'a>(&self, state: &'a Option<CollectionState>) -> Result<&'a CollectionState> {
        state
            .as_ref()
            .ok_or_else(|| RagStoreError::not_found(format!("Collection '{}' has been deleted", self.name)))
    }

    async fn commit(
        &self,
        guard: &mut RwLockWriteGuard<'_, Option<CollectionState>>,
        next: CollectionState,
    ) -> Result<()> {
        if let Some(storage) = &self.storage {
            storage.save(&next).await?;
        }
        **guard = Some(next);
        Ok(())
    }

    fn ensure_absent(state: &CollectionState, ids: &[String]) -> Result<()> {
        match ids.iter().find(|id| state.store.contains(id)) {
            Some(id) => Err(RagStoreError::duplicate_id(id.clone())),
            None => Ok(()),
        }
    }

    fn ensure_present(state: &CollectionState, ids: &[String]) -> Result<()> {
        match ids.iter().find(|id| !state.store.contains(id)) {
            Some(id) => Err(RagStoreError::not_found(format!("Document {}", id))),
            None => Ok(()),
        }
    }

    fn select<'a>(
        state: &'a CollectionState,
        ids: Option<&[String]>,
        where_: Option<&crate::filter::Where>,
        where_document: Option<&crate::filter::WhereDocument>,
    ) -> Vec<&'a Document> {
        let wanted: Option<HashSet<&str>> = ids.map(|ids| ids.iter().map(String::as_str).collect());
        state
            .store
            .list(where_, where_document)
            .into_iter()
            .filter(|d| wanted.as_ref().map_or(true, |set| set.contains(d.id.as_str())))
            .collect()
    }

    /// Record the embedder that produced a batch of text vectors
    fn stamp_embedder(state: &mut CollectionState, embedded_by: Option<String>) -> Result<()> {
        if let Some(name) = embedded_by {
            state.check_embedder(&name)?;
            state.embedder = Some(name);
        }
        Ok(())
    }

    fn vector_of(state: &CollectionState, id: &str) -> Result<Embedding> {
        state
            .index
            .get(id)
            .cloned()
            .ok_or_else(|| RagStoreError::not_found(format!("Vector for document {}", id)))
    }

    fn write_batch(state: &mut CollectionState, request: &AddRequest, embeddings: Vec<Embedding>) -> Result<()> {
        for (i, (id, embedding)) in request.ids.iter().zip(embeddings).enumerate() {
            state.index.insert(id, embedding)?;
            state.store.put(Document {
                id: id.clone(),
                text: request.documents.as_ref().map(|d| d[i].clone()),
                metadata: request.metadatas.as_ref().map(|m| m[i].clone()),
            });
        }
        Ok(())
    }

    async fn resolve_embeddings(&self, request: &AddRequest) -> Result<(Vec<Embedding>, Option<String>)> {
        match (&request.embeddings, &request.documents) {
            (Some(embeddings), _) => Ok((embeddings.clone(), None)),
            (None, Some(documents)) => {
                let (embeddings, name) = self.embed_texts(documents).await?;
                Ok((embeddings, Some(name)))
            }
            (None, None) => Err(RagStoreError::invalid_input(
                "Each document needs a text or an embedding",
            )),
        }
    }

    /// Run the embedding adapter under the configured timeout and check its output shape
    ///
    /// Returns the vectors and the name of the embedder that produced them.
    async fn embed_texts(&self, texts: &[String]) -> Result<(Vec<Embedding>, String)> {
        let embedder = self.embedder();
        let name = embedder.name().to_string();
        {
            let guard = self.state.read().await;
            self.live(&guard)?.check_embedder(&name)?;
        }
        if texts.is_empty() {
            return Ok((Vec::new(), name));
        }

        let embeddings = tokio::time::timeout(self.embed_timeout, embedder.embed(texts))
            .await
            .map_err(|_| RagStoreError::embedding(format!("{} timed out after {:?}", name, self.embed_timeout)))?
            .map_err(|e| match e {
                RagStoreError::EmbeddingFailure(_) => e,
                other => RagStoreError::embedding(other.to_string()),
            })?;

        if embeddings.len() != texts.len() {
            return Err(RagStoreError::embedding(format!(
                "{} returned {} embeddings for {} texts",
                name,
                embeddings.len(),
                texts.len()
            )));
        }
        let dim = embeddings[0].len();
        if dim == 0 || embeddings.iter().any(|e| e.len() != dim) {
            return Err(RagStoreError::embedding(format!(
                "{} returned empty or ragged embeddings",
                name
            )));
        }

        debug!("Embedded {} texts with {} (dim {})", texts.len(), name, dim);
        Ok((embeddings, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Where, WhereDocument};
    use crate::testing::{FailingEmbedder, KeywordEmbedder, ShortEmbedder, SlowEmbedder};
    use crate::types::{metadata, MetadataValue};
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn collection_with(embedder: Arc<dyn EmbeddingFunction>, timeout: Duration) -> Collection {
        let state = CollectionState::new("animals", None, DistanceMetric::Cosine);
        Collection::from_state(state, embedder, timeout, None)
    }

    fn collection() -> Collection {
        collection_with(Arc::new(KeywordEmbedder::new()), Duration::from_secs(5))
    }

    async fn seeded() -> Collection {
        let c = collection();
        c.add(
            AddRequest::new(["id1", "id2", "id3"])
                .documents(["The cat sleeps", "The dog barks", "A red car"])
                .metadatas(vec![
                    metadata([("kind", MetadataValue::from("pet")), ("year", MetadataValue::from(2019))]),
                    metadata([("kind", MetadataValue::from("pet")), ("year", MetadataValue::from(2022))]),
                    metadata([("kind", MetadataValue::from("vehicle")), ("year", MetadataValue::from(2021))]),
                ]),
        )
        .await
        .unwrap();
        c
    }

    #[tokio::test]
    async fn test_add_and_get() {
        let c = seeded().await;
        assert_eq!(c.count().await.unwrap(), 3);

        let got = c.get(GetRequest::new().ids(["id2"])).await.unwrap();
        assert_eq!(got.ids, vec!["id2"]);
        assert_eq!(got.documents, Some(vec![Some("The dog barks".to_string())]));
        assert_eq!(
            got.metadatas.unwrap()[0].as_ref().unwrap().get("year"),
            Some(&MetadataValue::Int(2022))
        );
        assert!(got.embeddings.is_none());
    }

    #[tokio::test]
    async fn test_get_insertion_order_and_pagination() {
        let c = seeded().await;
        let all = c.get(GetRequest::new()).await.unwrap();
        assert_eq!(all.ids, vec!["id1", "id2", "id3"]);

        let page = c.get(GetRequest::new().offset(1).limit(1)).await.unwrap();
        assert_eq!(page.ids, vec!["id2"]);

        let past_end = c.get(GetRequest::new().offset(10)).await.unwrap();
        assert!(past_end.is_empty());
    }

    #[tokio::test]
    async fn test_add_duplicate_changes_nothing() {
        let c = seeded().await;
        let err = c
            .add(AddRequest::new(["id4", "id1"]).documents(["kitten", "other"]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "DuplicateId");
        assert_eq!(c.count().await.unwrap(), 3);
        assert!(c.get(GetRequest::new().ids(["id4"])).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_overwrites_exactly() {
        let c = seeded().await;
        c.upsert(AddRequest::new(["id1", "id9"]).documents(["A feline", "A puppy"]))
            .await
            .unwrap();

        assert_eq!(c.count().await.unwrap(), 4);
        let got = c.get(GetRequest::new().ids(["id1"])).await.unwrap();
        assert_eq!(got.documents, Some(vec![Some("A feline".to_string())]));
        assert_eq!(got.metadatas, Some(vec![None]));

        // overwritten ids keep their position
        let all = c.get(GetRequest::new()).await.unwrap();
        assert_eq!(all.ids, vec!["id1", "id2", "id3", "id9"]);
    }

    #[tokio::test]
    async fn test_update() {
        let embedder = Arc::new(KeywordEmbedder::new());
        let c = collection_with(embedder.clone(), Duration::from_secs(5));
        c.add(
            AddRequest::new(["id1"])
                .documents(["The cat sleeps"])
                .metadatas(vec![metadata([("kind", "pet"), ("color", "black")])]),
        )
        .await
        .unwrap();

        let err = c.update(UpdateRequest::new(["id1", "missing"]).documents(["x", "y"])).await.unwrap_err();
        assert_eq!(err.code(), "NotFound");

        c.update(
            UpdateRequest::new(["id1"])
                .documents(["The dog sleeps"])
                .metadatas(vec![metadata([("color", "white")])]),
        )
        .await
        .unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);

        let got = c
            .get(GetRequest::new().include(vec![Include::Metadatas, Include::Embeddings]))
            .await
            .unwrap();
        assert!(got.documents.is_none());
        assert_eq!(
            got.metadatas.unwrap()[0],
            Some(metadata([("kind", "pet"), ("color", "white")]))
        );
        assert_eq!(got.embeddings.unwrap()[0], KeywordEmbedder::vector("The dog sleeps"));
    }

    #[tokio::test]
    async fn test_delete_selectors() {
        let c = seeded().await;

        let removed = c.delete(DeleteRequest::ids(["id1", "unknown"])).await.unwrap();
        assert_eq!(removed, vec!["id1"]);
        assert_eq!(c.count().await.unwrap(), 2);

        let removed = c.delete(DeleteRequest::matching(Where::eq("kind", "vehicle"))).await.unwrap();
        assert_eq!(removed, vec!["id3"]);

        let removed = c
            .delete(DeleteRequest::matching_document(WhereDocument::contains("cat")))
            .await
            .unwrap();
        assert!(removed.is_empty());

        let removed = c
            .delete(DeleteRequest::matching_document(WhereDocument::contains("dog")))
            .await
            .unwrap();
        assert_eq!(removed, vec!["id2"]);
        assert_eq!(c.count().await.unwrap(), 0);

        let err = c.delete(DeleteRequest::default()).await.unwrap_err();
        assert_eq!(err.code(), "InvalidSelector");
    }

    #[tokio::test]
    async fn test_query_nearest_first() {
        let c = seeded().await;
        let result = c.query(QueryRequest::texts(["feline"]).n_results(2)).await.unwrap();

        assert_eq!(result.first_id(), Some("id1"));
        assert_eq!(result.ids[0].len(), 2);
        let distances = &result.distances.as_ref().unwrap()[0];
        assert!(distances[0] < 1e-6);
        assert!(distances[0] <= distances[1]);
        assert_eq!(result.documents.unwrap()[0][0].as_deref(), Some("The cat sleeps"));
        assert!(result.embeddings.is_none());

        let many = c.query(QueryRequest::texts(["dog", "car"]).n_results(50)).await.unwrap();
        assert_eq!(many.ids.len(), 2);
        assert_eq!(many.ids[0].len(), 3);
        assert_eq!(many.ids[0][0], "id2");
        assert_eq!(many.ids[1][0], "id3");
    }

    #[tokio::test]
    async fn test_query_with_filters() {
        let c = seeded().await;
        let selector = Where::from_json(&json!({"year": {"$gte": 2021}})).unwrap();
        let result = c
            .query(QueryRequest::texts(["cat"]).where_(selector))
            .await
            .unwrap();
        assert_eq!(result.ids[0], vec!["id2", "id3"]);

        let result = c
            .query(
                QueryRequest::texts(["cat"])
                    .where_(Where::eq("kind", "pet"))
                    .where_document(WhereDocument::contains("dog")),
            )
            .await
            .unwrap();
        assert_eq!(result.ids[0], vec!["id2"]);
    }

    #[tokio::test]
    async fn test_query_empty_collection() {
        let c = seeded().await;
        c.delete(DeleteRequest::ids(["id1", "id2", "id3"])).await.unwrap();

        let result = c.query(QueryRequest::texts(["cat"])).await.unwrap();
        assert_eq!(result.ids, vec![Vec::<String>::new()]);
        assert_eq!(c.info().await.unwrap().dimension, Some(4));
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let c = collection();
        c.add(AddRequest::new(["a"]).embeddings(vec![vec![1.0, 0.0, 0.0]])).await.unwrap();

        let err = c
            .add(AddRequest::new(["b"]).embeddings(vec![vec![1.0, 0.0]]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "DimensionMismatch");

        let err = c.query(QueryRequest::embeddings(vec![vec![1.0]])).await.unwrap_err();
        assert_eq!(err.code(), "DimensionMismatch");
        assert_eq!(c.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_include_rules() {
        let c = seeded().await;
        let err = c
            .get(GetRequest::new().include(vec![Include::Distances]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "InvalidInput");

        let peek = c.peek(Some(2)).await.unwrap();
        assert_eq!(peek.ids, vec!["id1", "id2"]);
        assert_eq!(peek.embeddings.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_embedding_failures() {
        let c = collection_with(Arc::new(FailingEmbedder), Duration::from_secs(5));
        let err = c.add(AddRequest::new(["a"]).documents(["x"])).await.unwrap_err();
        assert_eq!(err.code(), "EmbeddingFailure");
        assert_eq!(c.count().await.unwrap(), 0);

        let c = collection_with(Arc::new(SlowEmbedder(Duration::from_millis(500))), Duration::from_millis(20));
        let err = c.query(QueryRequest::texts(["x"])).await.unwrap_err();
        assert_eq!(err.code(), "EmbeddingFailure");

        let c = collection_with(Arc::new(ShortEmbedder), Duration::from_secs(5));
        let err = c.add(AddRequest::new(["a", "b"]).documents(["x", "y"])).await.unwrap_err();
        assert_eq!(err.code(), "EmbeddingFailure");
    }

    #[tokio::test]
    async fn test_modify_and_dropped_handle() {
        let c = seeded().await;
        c.modify(Some(metadata([("description", "animals and cars")]))).await.unwrap();
        assert_eq!(
            c.metadata().await.unwrap(),
            Some(metadata([("description", "animals and cars")]))
        );

        c.drop_state().await.unwrap();
        assert_eq!(c.count().await.unwrap_err().code(), "NotFound");
        assert_eq!(c.get(GetRequest::new()).await.unwrap_err().code(), "NotFound");
    }
}
