use ragstore_common::{RagStoreError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::distance::DistanceMetric;
use crate::types::{check_embedding, Embedding};

/// Vector index entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    /// Insertion sequence, used to break distance ties
    seq: u64,

    /// Stored vector
    vector: Embedding,
}

/// Exact (brute-force) k-nearest-neighbour index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    /// Entries map (doc_id -> entry)
    entries: HashMap<String, IndexEntry>,

    /// Distance metric
    metric: DistanceMetric,

    /// Vector dimension, fixed by the first insert
    dimension: Option<usize>,

    /// Next insertion sequence
    next_seq: u64,
}

impl VectorIndex {
    /// Create new empty index
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            entries: HashMap::new(),
            metric,
            dimension: None,
            next_seq: 0,
        }
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Dimension, once a vector has been stored
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Fail unless `vector` fits the index dimension (any length fits an index that never held a vector)
    pub fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        match self.dimension {
            Some(expected) if expected != vector.len() => {
                Err(RagStoreError::dimension_mismatch(expected, vector.len()))
            }
            _ => Ok(()),
        }
    }

    /// Insert or replace a vector; a replaced id keeps its insertion position
    pub fn insert(&mut self, id: &str, vector: Embedding) -> Result<()> {
        if vector.is_empty() {
            return Err(RagStoreError::invalid_input(format!("Empty embedding for id {}", id)));
        }
        check_embedding(&vector)?;
        self.check_dimension(&vector)?;
        self.dimension.get_or_insert(vector.len());

        if let Some(entry) = self.entries.get_mut(id) {
            entry.vector = vector;
        } else {
            let seq = self.next_seq;
            self.next_seq += 1;
            self.entries.insert(id.to_string(), IndexEntry { seq, vector });
        }
        Ok(())
    }

    /// Remove a vector; returns whether it was present
    pub fn remove(&mut self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    /// Get a stored vector
    pub fn get(&self, id: &str) -> Option<&Embedding> {
        self.entries.get(id).map(|e| &e.vector)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of stored vectors
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// k nearest neighbours of `query`, ascending distance, ties by insertion order
    ///
    /// `allowed` restricts the candidates to a pre-filtered id set.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        allowed: Option<&HashSet<String>>,
    ) -> Result<Vec<(String, f32)>> {
        if self.dimension.is_none() || k == 0 {
            return Ok(Vec::new());
        }
        self.check_dimension(query)?;
        check_embedding(query)?;

        let mut scored: Vec<(&String, u64, f32)> = self
            .entries
            .iter()
            .filter(|(id, _)| allowed.map_or(true, |set| set.contains(*id)))
            .map(|(id, entry)| (id, entry.seq, self.metric.distance(query, &entry.vector)))
            .collect();

        scored.sort_by(|a, b| match a.2.total_cmp(&b.2) {
            Ordering::Equal => a.1.cmp(&b.1),
            other => other,
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(id, _, distance)| (id.clone(), distance))
            .collect())
    }
}
