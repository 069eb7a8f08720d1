pub mod local;

use std::collections::HashSet;
use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

/// Errors that can occur during vector store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying storage failure (I/O, serialization).
    Storage(String),
    /// Vector dimensions do not agree.
    DimensionMismatch { expected: usize, got: usize },
    /// The store cannot execute this query shape.
    UnsupportedQuery(String),
    /// A record was missing data this store requires.
    InvalidRecord(String),
    /// A remote call failed, after retries where applicable.
    Remote(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(msg) => write!(f, "storage error: {msg}"),
            Self::DimensionMismatch { expected, got } => {
                write!(f, "dimension mismatch: expected {expected}, got {got}")
            }
            Self::UnsupportedQuery(msg) => write!(f, "unsupported query: {msg}"),
            Self::InvalidRecord(msg) => write!(f, "invalid record: {msg}"),
            Self::Remote(msg) => write!(f, "remote store error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// A document handed to `add_documents`.
///
/// `text` is what search results return to callers; `index_text` is the
/// (possibly enriched) representation that gets embedded. Callers that embed
/// locally set `embedding`; stores that embed server-side accept `None` and
/// embed `index_text` themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertRecord {
    pub id: String,
    pub text: String,
    pub index_text: String,
    pub embedding: Option<Vec<f32>>,
    pub metadata: serde_json::Value,
}

/// A search query, either pre-embedded or raw text for stores that embed
/// server-side.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Vector(Vec<f32>),
    Text(String),
}

/// Search results as parallel arrays; rank order is descending similarity.
///
/// All four arrays always share the same length and index correspondence.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub documents: Vec<String>,
    pub ids: Vec<String>,
    pub distances: Vec<f32>,
    pub metadatas: Vec<serde_json::Value>,
}

impl SearchResult {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Trait abstracting vector storage and similarity search.
///
/// `add_documents` is an upsert keyed by id: re-adding an existing id
/// replaces the prior record rather than duplicating it.
pub trait VectorStore: Send + Sync {
    /// Prepare the store for use: load persisted state, create the remote
    /// collection, and so on. Called once before any other operation.
    fn initialize(&self) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn add_documents(
        &self,
        records: Vec<UpsertRecord>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Return the `limit` most similar documents, best first.
    fn query(
        &self,
        query: Query,
        limit: usize,
    ) -> impl Future<Output = Result<SearchResult, StoreError>> + Send;

    /// Ids of all stored documents, used for incremental ingestion.
    fn existing_ids(&self) -> impl Future<Output = Result<HashSet<String>, StoreError>> + Send;
}
