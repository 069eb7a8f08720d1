use reqwest::Client;
use serde::{Deserialize, Serialize};

use sage_core::embedding::{EmbedError, Embedder};

use crate::provider::{build_http_client, error_message};

/// Embedding provider backed by an OpenAI-compatible `/embeddings` endpoint.
#[derive(Debug)]
pub struct RemoteEmbedder {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl RemoteEmbedder {
    pub fn new(endpoint: &str, api_key: Option<&str>, model: &str) -> Self {
        Self {
            client: build_http_client(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.map(str::to_string),
            model: model.to_string(),
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl Embedder for RemoteEmbedder {
    async fn get_embedding(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let url = format!("{}/embeddings", self.endpoint);
        let mut request = self.client.post(&url).json(&EmbeddingRequest {
            model: &self.model,
            input: text,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EmbedError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(EmbedError::Http {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
                message: error_message(&body_text),
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::MalformedResponse(e.to_string()))?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbedError::MalformedResponse("response contained no embeddings".into()))
    }
}

/// Stub used when the vector store embeds internally: every call fails fast
/// so a misrouted embedding request is caught loudly instead of silently
/// producing garbage vectors.
#[derive(Debug)]
pub struct StoreManagedEmbedder;

impl Embedder for StoreManagedEmbedder {
    async fn get_embedding(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
        Err(EmbedError::Disabled(
            "embeddings are handled inside the vector store; no standalone embedding provider is configured".into(),
        ))
    }
}
