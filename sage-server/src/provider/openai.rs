use std::time::Instant;

use reqwest::Client;
use serde::Deserialize;

use sage_core::llm::{Generation, LanguageModel, LlmError};

use crate::provider::{build_http_client, error_message};

/// OpenAI-compatible chat-completions provider (works with OpenAI, Azure
/// OpenAI, and any endpoint that speaks the same protocol).
#[derive(Debug)]
pub struct OpenAiModel {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiModel {
    pub fn new(endpoint: &str, api_key: &str, model: &str) -> Self {
        Self {
            client: build_http_client(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

/// Build the non-streaming chat-completions request body: the assembled RAG
/// prompt travels as a single user message.
fn build_request_body(model: &str, prompt: &str) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "messages": [
            { "role": "user", "content": prompt }
        ],
        "stream": false,
    })
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl LanguageModel for OpenAiModel {
    async fn generate(&self, prompt: &str) -> Result<Generation, LlmError> {
        let url = format!("{}/chat/completions", self.endpoint);
        let body = build_request_body(&self.model, prompt);
        let started = Instant::now();

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
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

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::MalformedResponse("response contained no choices".into()))?;

        Ok(Generation {
            text,
            latency: started.elapsed(),
        })
    }
}
