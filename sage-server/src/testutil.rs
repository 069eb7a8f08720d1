//! Shared mock providers for sage-server tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sage_core::embedding::{EmbedError, Embedder};
use sage_core::llm::{Generation, LanguageModel, LlmError};
use sage_core::store::{Query, SearchResult, StoreError, UpsertRecord, VectorStore};

/// Build a `SearchResult` from `(id, document, distance)` triples.
pub fn search_result(entries: &[(&str, &str, f32)]) -> SearchResult {
    let mut result = SearchResult::default();
    for (id, doc, distance) in entries {
        result.ids.push(id.to_string());
        result.documents.push(doc.to_string());
        result.distances.push(*distance);
        result.metadatas.push(serde_json::Value::Null);
    }
    result
}

// ── Vector store ────────────────────────────────────────────────────────

#[derive(Default)]
struct MockStoreInner {
    results: Mutex<SearchResult>,
    batches: Mutex<Vec<Vec<UpsertRecord>>>,
    ids: Mutex<HashSet<String>>,
    last_query: Mutex<Option<Query>>,
}

/// In-memory stand-in for a vector store. Records every upsert batch and the
/// last query so tests can assert on them.
#[derive(Clone, Default)]
pub struct MockVectorStore {
    inner: Arc<MockStoreInner>,
}

impl MockVectorStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_results(results: SearchResult) -> Self {
        let store = Self::default();
        *store.inner.results.lock().unwrap() = results;
        store
    }

    pub fn with_existing_ids(ids: &[&str]) -> Self {
        let store = Self::default();
        *store.inner.ids.lock().unwrap() = ids.iter().map(|s| s.to_string()).collect();
        store
    }

    /// All batches handed to `add_documents`, in call order.
    pub fn batches(&self) -> Vec<Vec<UpsertRecord>> {
        self.inner.batches.lock().unwrap().clone()
    }

    pub fn last_query(&self) -> Option<Query> {
        self.inner.last_query.lock().unwrap().clone()
    }
}

impl VectorStore for MockVectorStore {
    async fn initialize(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn add_documents(&self, records: Vec<UpsertRecord>) -> Result<(), StoreError> {
        let mut ids = self.inner.ids.lock().unwrap();
        for record in &records {
            ids.insert(record.id.clone());
        }
        self.inner.batches.lock().unwrap().push(records);
        Ok(())
    }

    async fn query(&self, query: Query, limit: usize) -> Result<SearchResult, StoreError> {
        *self.inner.last_query.lock().unwrap() = Some(query);
        let mut results = self.inner.results.lock().unwrap().clone();
        results.documents.truncate(limit);
        results.ids.truncate(limit);
        results.distances.truncate(limit);
        results.metadatas.truncate(limit);
        Ok(results)
    }

    async fn existing_ids(&self) -> Result<HashSet<String>, StoreError> {
        Ok(self.inner.ids.lock().unwrap().clone())
    }
}

// ── Embedder ────────────────────────────────────────────────────────────

enum EmbedBehavior {
    Constant(usize),
    Disabled,
    Failing,
    /// Fails only for texts containing the marker.
    FailOn(String, usize),
}

/// Embedder double: constant vectors by default, with disabled and failing
/// variants. Counts calls so incremental-ingestion tests can assert that no
/// embedding work happened.
#[derive(Clone)]
pub struct MockEmbedder {
    behavior: Arc<EmbedBehavior>,
    calls: Arc<AtomicUsize>,
}

impl MockEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            behavior: Arc::new(EmbedBehavior::Constant(dims)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn disabled() -> Self {
        Self {
            behavior: Arc::new(EmbedBehavior::Disabled),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            behavior: Arc::new(EmbedBehavior::Failing),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_on(marker: &str, dims: usize) -> Self {
        Self {
            behavior: Arc::new(EmbedBehavior::FailOn(marker.to_string(), dims)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for MockEmbedder {
    async fn get_embedding(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &*self.behavior {
            EmbedBehavior::Constant(dims) => Ok(vec![0.5; *dims]),
            EmbedBehavior::Disabled => Err(EmbedError::Disabled(
                "embeddings are handled inside the vector store".into(),
            )),
            EmbedBehavior::Failing => {
                Err(EmbedError::Network(format!("mock embedder failure for '{text}'")))
            }
            EmbedBehavior::FailOn(marker, dims) => {
                if text.contains(marker) {
                    Err(EmbedError::Network(format!("mock embedder failure for '{text}'")))
                } else {
                    Ok(vec![0.5; *dims])
                }
            }
        }
    }
}

// ── Language model ──────────────────────────────────────────────────────

struct MockLlmInner {
    reply: String,
    fail: bool,
    last_prompt: Mutex<Option<String>>,
}

/// Language-model double that records the last prompt it was handed.
#[derive(Clone)]
pub struct MockLanguageModel {
    inner: Arc<MockLlmInner>,
}

impl MockLanguageModel {
    pub fn new(reply: &str) -> Self {
        Self {
            inner: Arc::new(MockLlmInner {
                reply: reply.to_string(),
                fail: false,
                last_prompt: Mutex::new(None),
            }),
        }
    }

    pub fn failing() -> Self {
        Self {
            inner: Arc::new(MockLlmInner {
                reply: String::new(),
                fail: true,
                last_prompt: Mutex::new(None),
            }),
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.inner.last_prompt.lock().unwrap().clone()
    }
}

impl LanguageModel for MockLanguageModel {
    async fn generate(&self, prompt: &str) -> Result<Generation, LlmError> {
        *self.inner.last_prompt.lock().unwrap() = Some(prompt.to_string());
        if self.inner.fail {
            return Err(LlmError::Http {
                status: 500,
                status_text: "Internal Server Error".into(),
                message: "mock language model failure".into(),
            });
        }
        Ok(Generation {
            text: self.inner.reply.clone(),
            latency: Duration::from_millis(7),
        })
    }
}
