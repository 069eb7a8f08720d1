//! HTTP API layer for sage.
//!
//! ## Progressive disclosure
//!
//! The UI renders retrieval results before the answer arrives, so search and
//! generation are exposed as two independently callable endpoints
//! (`/api/search`, `/api/generate`) alongside the combined `/api/ask`. Plain
//! request/response pairs are enough here; nothing streams.
//!
//! Every response body is a tagged `{ success, ... | error }` envelope:
//! pipeline failures come back as `success: false` with HTTP 200, and only a
//! malformed request earns a 4xx.

mod ingest;
mod query;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::Router;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};

use sage_core::config::Config;
use sage_core::embedding::Embedder;
use sage_core::llm::LanguageModel;
use sage_core::record::Record;
use sage_core::store::VectorStore;

use crate::ingest::IngestStatus;
use crate::pipeline::RagDetails;
use crate::provider::{ProviderBuilder, ProviderInitError, Providers};

// ── Request / response envelopes ────────────────────────────────────────

#[derive(Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Serialize, Deserialize)]
pub struct GenerateRequest {
    pub question: String,
    #[serde(default)]
    pub documents: Vec<String>,
}

#[derive(Serialize, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub force: bool,
}

#[derive(Serialize, Deserialize)]
pub struct SearchResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<RagDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResponse {
    pub fn ok(details: RagDetails) -> Self {
        Self {
            success: true,
            details: Some(details),
            error: None,
        }
    }

    pub fn failure(message: String) -> Self {
        Self {
            success: false,
            details: None,
            error: Some(message),
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct GenerateResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerateResponse {
    pub fn failure(message: String) -> Self {
        Self {
            success: false,
            answer: None,
            latency_ms: None,
            error: Some(message),
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct AskResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<RagDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AskResponse {
    pub fn failure(message: String) -> Self {
        Self {
            success: false,
            details: None,
            answer: None,
            latency_ms: None,
            error: Some(message),
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct IngestResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IngestResponse {
    pub fn failure(message: String) -> Self {
        Self {
            success: false,
            message: None,
            processed: None,
            error: Some(message),
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<IngestStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn failure(message: String) -> Self {
        Self {
            success: false,
            status: None,
            error: Some(message),
        }
    }
}

// ── Shared application state ────────────────────────────────────────────

/// Shared application state.
///
/// The provider singletons are constructed lazily on first use and held in
/// an `ArcSwap` so handlers get a cheap snapshot per request. The
/// `init_lock` makes first-time construction single-flight: concurrent
/// first requests on the multi-threaded runtime would otherwise race to
/// build providers.
pub struct AppState<S, E, L> {
    pub config: Config,
    pub records: Vec<Record>,
    providers: ArcSwap<Option<Arc<Providers<S, E, L>>>>,
    init_lock: tokio::sync::Mutex<()>,
    builder: ProviderBuilder<S, E, L>,
}

impl<S, E, L> AppState<S, E, L>
where
    S: VectorStore,
    E: Embedder,
    L: LanguageModel,
{
    pub fn new(config: Config, records: Vec<Record>, builder: ProviderBuilder<S, E, L>) -> Self {
        Self {
            config,
            records,
            providers: ArcSwap::from_pointee(None),
            init_lock: tokio::sync::Mutex::new(()),
            builder,
        }
    }

    /// Return the provider singletons, constructing them on first use.
    ///
    /// A failed construction stores nothing, so the next call rebuilds all
    /// three providers from scratch rather than retrying partial state.
    pub async fn acquire_providers(&self) -> Result<Arc<Providers<S, E, L>>, ProviderInitError> {
        let snapshot = self.providers.load();
        if let Some(providers) = snapshot.as_ref().as_ref() {
            return Ok(Arc::clone(providers));
        }
        drop(snapshot);

        let _guard = self.init_lock.lock().await;
        // Another request may have finished initialization while we waited.
        let snapshot = self.providers.load();
        if let Some(providers) = snapshot.as_ref().as_ref() {
            return Ok(Arc::clone(providers));
        }
        drop(snapshot);

        match (self.builder)().await {
            Ok(providers) => {
                let providers = Arc::new(providers);
                self.providers.store(Arc::new(Some(Arc::clone(&providers))));
                Ok(providers)
            }
            Err(e) => {
                self.providers.store(Arc::new(None));
                Err(e)
            }
        }
    }
}

/// Build the API router over any provider set.
pub fn router<S, E, L>(state: Arc<AppState<S, E, L>>) -> Router
where
    S: VectorStore + 'static,
    E: Embedder + 'static,
    L: LanguageModel + 'static,
{
    Router::new()
        .route("/api/search", post(query::search_handler::<S, E, L>))
        .route("/api/generate", post(query::generate_handler::<S, E, L>))
        .route("/api/ask", post(query::ask_handler::<S, E, L>))
        .route("/api/ingest", post(ingest::ingest_handler::<S, E, L>))
        .route("/api/ingest/status", get(ingest::status_handler::<S, E, L>))
        .with_state(state)
}
