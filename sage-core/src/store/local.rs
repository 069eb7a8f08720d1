use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::{Query, SearchResult, StoreError, UpsertRecord, VectorStore};

/// A stored document with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// On-disk shape of the local store: one JSON object holding every record.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedStore {
    documents: Vec<VectorRecord>,
}

/// Local fallback vector store: brute-force cosine similarity over an
/// in-memory record list, persisted as a single flat JSON file.
///
/// Every mutation rewrites the whole file. That is O(n) per write and not
/// designed to scale; it is acceptable here because the demo corpus is small.
#[derive(Debug)]
pub struct LocalVectorStore {
    records: Mutex<Vec<VectorRecord>>,
    path: Option<PathBuf>,
}

impl LocalVectorStore {
    /// Create a store backed by the JSON file at `path`. The file is loaded
    /// (or created on first write) by `initialize`.
    pub fn open(path: &Path) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            path: Some(path.to_path_buf()),
        }
    }

    /// Create a store with no backing file.
    ///
    /// This is a test helper and should not be used in production code.
    pub fn in_memory() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            path: None,
        }
    }

    fn load(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Storage(format!("failed to read '{}': {e}", path.display()))
        })?;
        let persisted: PersistedStore = serde_json::from_str(&contents).map_err(|e| {
            StoreError::Storage(format!("corrupt store file '{}': {e}", path.display()))
        })?;
        *self.records.lock().unwrap() = persisted.documents;
        Ok(())
    }

    /// Serialize the whole record set back to disk.
    fn persist(&self, records: &[VectorRecord]) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let persisted = PersistedStore {
            documents: records.to_vec(),
        };
        let json = serde_json::to_string(&persisted)
            .map_err(|e| StoreError::Storage(format!("failed to serialize store: {e}")))?;
        std::fs::write(path, json).map_err(|e| {
            StoreError::Storage(format!("failed to write '{}': {e}", path.display()))
        })
    }
}

/// Cosine similarity between two vectors.
///
/// Fails when dimensions differ; returns 0.0 when either vector has zero
/// magnitude so callers never divide by zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, StoreError> {
    if a.len() != b.len() {
        return Err(StoreError::DimensionMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a * norm_b))
}

impl VectorStore for LocalVectorStore {
    async fn initialize(&self) -> Result<(), StoreError> {
        self.load()
    }

    async fn add_documents(&self, records: Vec<UpsertRecord>) -> Result<(), StoreError> {
        let mut stored = self.records.lock().unwrap();
        for record in records {
            let Some(embedding) = record.embedding else {
                return Err(StoreError::InvalidRecord(format!(
                    "record '{}' has no embedding; the local store cannot embed internally",
                    record.id
                )));
            };
            if let Some(first) = stored.first() {
                if embedding.len() != first.embedding.len() {
                    return Err(StoreError::DimensionMismatch {
                        expected: first.embedding.len(),
                        got: embedding.len(),
                    });
                }
            }
            // Upsert: drop any record with the same id before appending.
            stored.retain(|r| r.id != record.id);
            stored.push(VectorRecord {
                id: record.id,
                text: record.text,
                embedding,
            });
        }
        self.persist(&stored)
    }

    async fn query(&self, query: Query, limit: usize) -> Result<SearchResult, StoreError> {
        let vector = match query {
            Query::Vector(v) => v,
            Query::Text(_) => {
                return Err(StoreError::UnsupportedQuery(
                    "the local store requires a query vector; embed the text first".into(),
                ));
            }
        };

        let stored = self.records.lock().unwrap();
        let mut scored: Vec<(&VectorRecord, f32)> = Vec::with_capacity(stored.len());
        for record in stored.iter() {
            let score = cosine_similarity(&vector, &record.embedding)?;
            scored.push((record, score));
        }

        // Stable sort: ties keep insertion order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        let mut result = SearchResult::default();
        for (record, score) in scored {
            result.documents.push(record.text.clone());
            result.ids.push(record.id.clone());
            result.distances.push(1.0 - score);
            result.metadatas.push(serde_json::Value::Null);
        }
        Ok(result)
    }

    async fn existing_ids(&self) -> Result<HashSet<String>, StoreError> {
        let stored = self.records.lock().unwrap();
        Ok(stored.iter().map(|r| r.id.clone()).collect())
    }
}
