use std::time::Instant;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use sage_core::llm::{Generation, LanguageModel, LlmError};

use crate::provider::{build_http_client, error_message};

/// Language model served by a local Ollama daemon. No API key required.
#[derive(Debug)]
pub struct OllamaModel {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaModel {
    pub fn new(endpoint: &str, model: &str) -> Self {
        Self {
            client: build_http_client(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl LanguageModel for OllamaModel {
    async fn generate(&self, prompt: &str) -> Result<Generation, LlmError> {
        let url = format!("{}/api/generate", self.endpoint);
        let started = Instant::now();

        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Http {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
                message: error_message(&body_text),
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        Ok(Generation {
            text: parsed.response,
            latency: started.elapsed(),
        })
    }
}
