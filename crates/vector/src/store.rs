use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::filter::{Where, WhereDocument};
use crate::types::Document;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredDocument {
    seq: u64,
    document: Document,
}

/// Document store: id -> text + metadata, with insertion order retained
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentStore {
    documents: HashMap<String, StoredDocument>,
    next_seq: u64,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; a replaced document keeps its position
    pub fn put(&mut self, document: Document) {
        if let Some(stored) = self.documents.get_mut(&document.id) {
            stored.document = document;
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.documents
            .insert(document.id.clone(), StoredDocument { seq, document });
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.get(id).map(|s| &s.document)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.documents.contains_key(id)
    }

    /// Remove a document; returns it if it was present
    pub fn delete(&mut self, id: &str) -> Option<Document> {
        self.documents.remove(id).map(|s| s.document)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Documents passing both selectors (AND), in insertion order
    pub fn list(&self, where_: Option<&Where>, where_document: Option<&WhereDocument>) -> Vec<&Document> {
        let mut matched: Vec<&StoredDocument> = self
            .documents
            .values()
            .filter(|s| where_.map_or(true, |w| w.matches(s.document.metadata.as_ref())))
            .filter(|s| where_document.map_or(true, |w| w.matches(s.document.text.as_deref())))
            .collect();
        matched.sort_by_key(|s| s.seq);
        matched.into_iter().map(|s| &s.document).collect()
    }
}
