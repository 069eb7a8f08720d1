//! Provider adapters and the configuration-driven factory.
//!
//! Selection is pure: each `select_*` function maps a config section to a
//! concrete adapter without side effects. `build_providers` composes the
//! three selections and performs the one effectful step (store
//! initialization). Lifecycle — lazy construction, memoization, reset on
//! failure — is owned by the caller (`AppState`).

pub mod embedder;
pub mod filter;
pub mod hosted_store;
pub mod ollama;
pub mod openai;
pub mod retry;

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Deserialize;

use sage_core::config::{Config, EmbeddingConfig, LlmConfig, VectorStoreConfig};
use sage_core::embedding::{EmbedError, Embedder};
use sage_core::llm::{Generation, LanguageModel, LlmError};
use sage_core::store::local::LocalVectorStore;
use sage_core::store::{Query, SearchResult, StoreError, UpsertRecord, VectorStore};

use embedder::{RemoteEmbedder, StoreManagedEmbedder};
use hosted_store::HostedVectorStore;
use ollama::OllamaModel;
use openai::OpenAiModel;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur while constructing the provider set.
#[derive(Debug)]
pub enum ProviderInitError {
    /// A required parameter is missing or a kind is unrecognized.
    InvalidConfig(String),
    /// The vector store failed to initialize.
    StoreInit(String),
}

impl fmt::Display for ProviderInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::StoreInit(msg) => write!(f, "vector store init failed: {msg}"),
        }
    }
}

impl std::error::Error for ProviderInitError {}

/// HTTP client shared shape for every outbound adapter: 60s request budget,
/// 5s connect.
pub(crate) fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .expect("failed to build HTTP client")
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Pull a human-readable message out of an error body: the conventional
/// `{"error": {"message": ...}}` shape when present, the raw body otherwise.
pub(crate) fn error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body) {
        return parsed.error.message;
    }
    if body.trim().is_empty() {
        "no response body".to_string()
    } else {
        body.to_string()
    }
}

// ── Enum dispatch over the concrete adapters ────────────────────────────

#[derive(Debug)]
pub enum AnyVectorStore {
    Local(LocalVectorStore),
    Hosted(HostedVectorStore),
}

impl VectorStore for AnyVectorStore {
    async fn initialize(&self) -> Result<(), StoreError> {
        match self {
            Self::Local(s) => s.initialize().await,
            Self::Hosted(s) => s.initialize().await,
        }
    }

    async fn add_documents(&self, records: Vec<UpsertRecord>) -> Result<(), StoreError> {
        match self {
            Self::Local(s) => s.add_documents(records).await,
            Self::Hosted(s) => s.add_documents(records).await,
        }
    }

    async fn query(&self, query: Query, limit: usize) -> Result<SearchResult, StoreError> {
        match self {
            Self::Local(s) => s.query(query, limit).await,
            Self::Hosted(s) => s.query(query, limit).await,
        }
    }

    async fn existing_ids(&self) -> Result<HashSet<String>, StoreError> {
        match self {
            Self::Local(s) => s.existing_ids().await,
            Self::Hosted(s) => s.existing_ids().await,
        }
    }
}

#[derive(Debug)]
pub enum AnyEmbedder {
    Remote(RemoteEmbedder),
    StoreManaged(StoreManagedEmbedder),
}

impl Embedder for AnyEmbedder {
    async fn get_embedding(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        match self {
            Self::Remote(e) => e.get_embedding(text).await,
            Self::StoreManaged(e) => e.get_embedding(text).await,
        }
    }
}

#[derive(Debug)]
pub enum AnyLanguageModel {
    Ollama(OllamaModel),
    OpenAi(OpenAiModel),
}

impl LanguageModel for AnyLanguageModel {
    async fn generate(&self, prompt: &str) -> Result<Generation, LlmError> {
        match self {
            Self::Ollama(m) => m.generate(prompt).await,
            Self::OpenAi(m) => m.generate(prompt).await,
        }
    }
}

/// The three provider singletons a request path needs.
#[derive(Debug)]
pub struct Providers<S, E, L> {
    pub store: S,
    pub embedder: E,
    pub llm: L,
}

pub type RuntimeProviders = Providers<AnyVectorStore, AnyEmbedder, AnyLanguageModel>;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Deferred provider construction, owned by `AppState`. Invoked at most once
/// per (re)initialization attempt.
pub type ProviderBuilder<S, E, L> =
    Box<dyn Fn() -> BoxFuture<Result<Providers<S, E, L>, ProviderInitError>> + Send + Sync>;

// ── Pure selection ──────────────────────────────────────────────────────

fn require<'a>(
    value: Option<&'a str>,
    key: &str,
    context: &str,
) -> Result<&'a str, ProviderInitError> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| {
        ProviderInitError::InvalidConfig(format!("{key} is required when {context}"))
    })
}

fn validate_endpoint(endpoint: &str, context: &str) -> Result<(), ProviderInitError> {
    url::Url::parse(endpoint).map_err(|e| {
        ProviderInitError::InvalidConfig(format!("invalid {context} endpoint '{endpoint}': {e}"))
    })?;
    Ok(())
}

pub fn select_vector_store(config: &VectorStoreConfig) -> Result<AnyVectorStore, ProviderInitError> {
    match config.store_type.as_str() {
        "local" => Ok(AnyVectorStore::Local(LocalVectorStore::open(&config.path))),
        "hosted" => {
            let endpoint = require(
                config.endpoint.as_deref(),
                "endpoint",
                "vector_store.type = \"hosted\"",
            )?;
            validate_endpoint(endpoint, "vector store")?;
            Ok(AnyVectorStore::Hosted(HostedVectorStore::new(
                endpoint,
                config.api_key.as_deref(),
                &config.collection,
                config.attribute_filter,
            )))
        }
        other => Err(ProviderInitError::InvalidConfig(format!(
            "unknown vector store type '{other}'. Valid types: hosted, local"
        ))),
    }
}

pub fn select_embedder(config: &EmbeddingConfig) -> Result<AnyEmbedder, ProviderInitError> {
    match config.provider_type.as_str() {
        "store-managed" => Ok(AnyEmbedder::StoreManaged(StoreManagedEmbedder)),
        "remote" => {
            let endpoint = require(
                config.endpoint.as_deref(),
                "endpoint",
                "embedding.type = \"remote\"",
            )?;
            validate_endpoint(endpoint, "embedding")?;
            let model = require(
                config.model.as_deref(),
                "model",
                "embedding.type = \"remote\"",
            )?;
            Ok(AnyEmbedder::Remote(RemoteEmbedder::new(
                endpoint,
                config.api_key.as_deref(),
                model,
            )))
        }
        other => Err(ProviderInitError::InvalidConfig(format!(
            "unknown embedding provider type '{other}'. Valid types: remote, store-managed"
        ))),
    }
}

pub fn select_language_model(config: &LlmConfig) -> Result<AnyLanguageModel, ProviderInitError> {
    validate_endpoint(&config.endpoint, "language model")?;
    match config.provider_type.as_str() {
        "ollama" => Ok(AnyLanguageModel::Ollama(OllamaModel::new(
            &config.endpoint,
            &config.model,
        ))),
        "openai" => {
            let api_key = require(
                config.api_key.as_deref(),
                "api_key",
                "llm.type = \"openai\"",
            )?;
            Ok(AnyLanguageModel::OpenAi(OpenAiModel::new(
                &config.endpoint,
                api_key,
                &config.model,
            )))
        }
        other => Err(ProviderInitError::InvalidConfig(format!(
            "unknown language model provider type '{other}'. Valid types: ollama, openai"
        ))),
    }
}

/// Construct and initialize the full provider set from config.
///
/// Built fresh on every call: a failed attempt leaves nothing behind, so
/// retrying after a failure starts from a clean slate.
pub async fn build_providers(config: &Config) -> Result<RuntimeProviders, ProviderInitError> {
    if config.vector_store.store_type == "local"
        && config.embedding.provider_type == "store-managed"
    {
        return Err(ProviderInitError::InvalidConfig(
            "the local vector store cannot embed internally; set [embedding] type = \"remote\""
                .into(),
        ));
    }

    let store = select_vector_store(&config.vector_store)?;
    let embedder = select_embedder(&config.embedding)?;
    let llm = select_language_model(&config.llm)?;

    store
        .initialize()
        .await
        .map_err(|e| ProviderInitError::StoreInit(e.to_string()))?;

    Ok(Providers {
        store,
        embedder,
        llm,
    })
}
