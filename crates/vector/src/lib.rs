//! RagStore vector store
//!
//! Collections of documents with exact k-NN search over their embeddings,
//! metadata and content filters, and optional on-disk persistence.

mod client;
mod collection;
mod distance;
mod filter;
mod index;
mod persistence;
mod request;
mod store;
mod types;

#[cfg(test)]
mod testing;

pub use client::{validate_collection_name, Client, ClientSettings, CollectionOptions, METRIC_METADATA_KEY};
pub use collection::{Collection, CollectionInfo, DEFAULT_PEEK_LIMIT};
pub use distance::DistanceMetric;
pub use filter::{FieldOp, Where, WhereDocument};
pub use index::VectorIndex;
pub use request::{AddRequest, DeleteRequest, GetRequest, QueryInput, QueryRequest, UpdateRequest};
pub use store::DocumentStore;
pub use types::{metadata, Document, Embedding, GetResult, Include, Metadata, MetadataValue, QueryResult};
