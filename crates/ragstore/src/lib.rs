//! ragstore
//!
//! Embedded vector store for retrieval-augmented generation: named
//! collections of documents, exact nearest-neighbour search over their
//! embeddings, metadata and content filters, and optional persistence.
//!
//! ```no_run
//! use ragstore::{AddRequest, Client, CollectionOptions, HashEmbedder, QueryRequest};
//! use std::sync::Arc;
//!
//! # async fn demo() -> ragstore::Result<()> {
//! let client = Client::ephemeral(Arc::new(HashEmbedder::new(384)?));
//! let books = client.create_collection("books", CollectionOptions::new()).await?;
//! books
//!     .add(AddRequest::new(["id1", "id2"]).documents(["A cat on a mat", "A dog in the fog"]))
//!     .await?;
//! let hits = books.query(QueryRequest::texts(["cat"]).n_results(1)).await?;
//! println!("{:?}", hits.first_id());
//! # Ok(())
//! # }
//! ```

pub use ragstore_common::{logger, RagStoreError, Result, StoreConfig};
pub use ragstore_embed::{EmbeddingFunction, HashEmbedder, OllamaEmbedder, DEFAULT_HASH_DIM};
pub use ragstore_vector::*;

use std::sync::Arc;
use tracing::info;

/// Load configuration from the environment, set up logging and open a client
pub async fn open_from_env() -> Result<Client> {
    let config = StoreConfig::from_env()?;
    let log_file = logger::setup_logging(&config)?;
    info!("Logging to {}", log_file.display());
    Client::from_config(&config).await
}

/// Ephemeral client with the default hashing embedder
pub fn ephemeral_client() -> Result<Client> {
    Ok(Client::ephemeral(Arc::new(HashEmbedder::new(DEFAULT_HASH_DIM)?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ephemeral_client() {
        let client = ephemeral_client().unwrap();
        assert!(!client.is_persistent());
        let c = client.create_collection("docs", CollectionOptions::new()).await.unwrap();
        assert_eq!(c.embedder_name(), "hash:384");
    }
}
