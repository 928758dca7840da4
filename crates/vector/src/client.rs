use ragstore_common::{RagStoreError, Result, StoreConfig};
use ragstore_embed::EmbeddingFunction;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::collection::{Collection, CollectionState};
use crate::distance::DistanceMetric;
use crate::persistence::Storage;
use crate::types::{check_metadata, Metadata, MetadataValue};

/// Metadata key that selects the metric when none is given explicitly
pub const METRIC_METADATA_KEY: &str = "hnsw:space";

/// Client construction settings
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Storage directory; `None` = ephemeral
    pub persist_directory: Option<PathBuf>,

    /// Upper bound for one embedding call
    pub embed_timeout: Duration,

    /// Metric for collections created without one
    pub default_metric: DistanceMetric,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            persist_directory: None,
            embed_timeout: Duration::from_secs(60),
            default_metric: DistanceMetric::Cosine,
        }
    }
}

impl ClientSettings {
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Ok(Self {
            persist_directory: config.persist_directory.clone(),
            embed_timeout: config.embed_timeout(),
            default_metric: config.default_metric.parse()?,
        })
    }
}

/// Options for `create_collection` / `get_or_create_collection`
#[derive(Clone, Default)]
pub struct CollectionOptions {
    pub metadata: Option<Metadata>,
    pub metric: Option<DistanceMetric>,
    /// Overrides the client's embedding adapter for this collection
    pub embedder: Option<Arc<dyn EmbeddingFunction>>,
}

impl CollectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = Some(metric);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingFunction>) -> Self {
        self.embedder = Some(embedder);
        self
    }
}

/// Registry of named collections, in memory or backed by a directory
pub struct Client {
    collections: RwLock<HashMap<String, Arc<Collection>>>,
    storage: Option<Storage>,
    embedder: Arc<dyn EmbeddingFunction>,
    settings: ClientSettings,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("settings", &self.settings)
            .field("embedder", &self.embedder.name())
            .finish()
    }
}

impl Client {
    /// In-memory client; everything is lost when it is dropped
    pub fn ephemeral(embedder: Arc<dyn EmbeddingFunction>) -> Self {
        info!("Ephemeral client initialized (embedder: {})", embedder.name());
        Self {
            collections: RwLock::new(HashMap::new()),
            storage: None,
            embedder,
            settings: ClientSettings::default(),
        }
    }

    /// Durable client; loads every collection found in `path`
    pub async fn persistent(path: impl Into<PathBuf>, embedder: Arc<dyn EmbeddingFunction>) -> Result<Self> {
        let settings = ClientSettings {
            persist_directory: Some(path.into()),
            ..Default::default()
        };
        Self::open(settings, embedder).await
    }

    /// Client from configuration, with the configured embedding provider
    pub async fn from_config(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let embedder = ragstore_embed::from_config(config)?;
        Self::open(ClientSettings::from_config(config)?, embedder).await
    }

    /// Client with explicit settings
    pub async fn open(settings: ClientSettings, embedder: Arc<dyn EmbeddingFunction>) -> Result<Self> {
        let Some(dir) = settings.persist_directory.clone() else {
            let mut client = Self::ephemeral(embedder);
            client.settings = settings;
            return Ok(client);
        };

        let storage = Storage::open(dir).await?;
        let mut collections = HashMap::new();
        for state in storage.load_all().await? {
            let collection = Collection::from_state(
                state,
                embedder.clone(),
                settings.embed_timeout,
                Some(storage.clone()),
            );
            collections.insert(collection.name().to_string(), Arc::new(collection));
        }

        info!(
            "Persistent client initialized at {} - {} collections (embedder: {})",
            storage.root().display(),
            collections.len(),
            embedder.name()
        );

        Ok(Self {
            collections: RwLock::new(collections),
            storage: Some(storage),
            embedder,
            settings,
        })
    }

    pub fn is_persistent(&self) -> bool {
        self.storage.is_some()
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Create a collection; fails with `AlreadyExists` if the name is taken
    pub async fn create_collection(&self, name: &str, options: CollectionOptions) -> Result<Arc<Collection>> {
        validate_collection_name(name)?;
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Err(RagStoreError::already_exists(format!("Collection '{}'", name)));
        }
        self.create_locked(&mut collections, name, options).await
    }

    /// Get a collection; fails with `NotFound` if absent
    pub async fn get_collection(&self, name: &str) -> Result<Arc<Collection>> {
        self.collections
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RagStoreError::not_found(format!("Collection '{}'", name)))
    }

    /// Get a collection and bind `embedder` to it
    ///
    /// Needed after reopening a collection created with its own embedder.
    /// Binding a differently named embedder to a non-empty collection fails
    /// with `EmbeddingFailure`.
    pub async fn get_collection_with(
        &self,
        name: &str,
        embedder: Arc<dyn EmbeddingFunction>,
    ) -> Result<Arc<Collection>> {
        let collection = self.get_collection(name).await?;
        collection.bind_embedder(embedder).await?;
        Ok(collection)
    }

    /// Existing collection or a new one created with `options`
    ///
    /// An existing collection keeps its metadata and metric; only
    /// `options.embedder` is applied to it.
    pub async fn get_or_create_collection(&self, name: &str, options: CollectionOptions) -> Result<Arc<Collection>> {
        validate_collection_name(name)?;
        let mut collections = self.collections.write().await;
        if let Some(existing) = collections.get(name).cloned() {
            debug!("Reusing existing collection '{}'", name);
            if let Some(embedder) = options.embedder {
                existing.bind_embedder(embedder).await?;
            }
            return Ok(existing);
        }
        self.create_locked(&mut collections, name, options).await
    }

    /// All collections, ordered by name
    pub async fn list_collections(&self) -> Vec<Arc<Collection>> {
        let mut all: Vec<Arc<Collection>> = self.collections.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    pub async fn count_collections(&self) -> usize {
        self.collections.read().await.len()
    }

    /// Delete a collection and free its documents; outstanding handles stop working
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get(name)
            .cloned()
            .ok_or_else(|| RagStoreError::not_found(format!("Collection '{}'", name)))?;

        collection.drop_state().await?;
        collections.remove(name);

        info!("Collection deleted: {}", name);
        Ok(())
    }

    /// Delete every collection
    pub async fn reset(&self) -> Result<()> {
        let mut collections = self.collections.write().await;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();

        for name in names {
            if let Some(collection) = collections.get(&name).cloned() {
                collection.drop_state().await?;
                collections.remove(&name);
            }
        }

        info!("Client reset - all collections deleted");
        Ok(())
    }

    async fn create_locked(
        &self,
        collections: &mut HashMap<String, Arc<Collection>>,
        name: &str,
        options: CollectionOptions,
    ) -> Result<Arc<Collection>> {
        let metric = match options.metric {
            Some(metric) => metric,
            None => metric_from_metadata(options.metadata.as_ref())?.unwrap_or(self.settings.default_metric),
        };

        if let Some(metadata) = &options.metadata {
            check_metadata(metadata)?;
        }

        let embedder = options.embedder.unwrap_or_else(|| self.embedder.clone());
        let mut state = CollectionState::new(name, options.metadata, metric);
        state.embedder = Some(embedder.name().to_string());
        if let Some(storage) = &self.storage {
            storage.save(&state).await?;
        }

        let collection = Arc::new(Collection::from_state(
            state,
            embedder,
            self.settings.embed_timeout,
            self.storage.clone(),
        ));
        collections.insert(name.to_string(), collection.clone());

        info!("Collection created: {} (metric: {})", name, metric);
        Ok(collection)
    }
}

fn metric_from_metadata(metadata: Option<&Metadata>) -> Result<Option<DistanceMetric>> {
    match metadata.and_then(|m| m.get(METRIC_METADATA_KEY)) {
        Some(MetadataValue::Str(s)) => s.parse().map(Some),
        Some(other) => Err(RagStoreError::invalid_input(format!(
            "{} must be a string, got {}",
            METRIC_METADATA_KEY, other
        ))),
        None => Ok(None),
    }
}

/// 3-63 characters of `[A-Za-z0-9._-]`, starting and ending alphanumeric
pub fn validate_collection_name(name: &str) -> Result<()> {
    let len = name.chars().count();
    let allowed = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    let edges_ok = name.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
        && name.chars().last().is_some_and(|c| c.is_ascii_alphanumeric());

    if !(3..=63).contains(&len) || !allowed || !edges_ok {
        return Err(RagStoreError::invalid_input(format!(
            "Invalid collection name '{}': use 3-63 characters [A-Za-z0-9._-], starting and ending with a letter or digit",
            name
        )));
    }
    Ok(())
}
