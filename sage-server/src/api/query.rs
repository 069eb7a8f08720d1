//! Question-answering endpoints: search, generate, and the combined ask.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;

use sage_core::embedding::Embedder;
use sage_core::llm::LanguageModel;
use sage_core::store::VectorStore;

use super::{AppState, AskRequest, AskResponse, GenerateRequest, GenerateResponse, SearchResponse};
use crate::pipeline::{
    PipelineError, answer_question, generate_answer, search_documents, validate_question,
};

/// `POST /api/search` — phase one only: retrieve context for a question so
/// the UI can show it while generation runs separately.
pub async fn search_handler<S, E, L>(
    State(state): State<Arc<AppState<S, E, L>>>,
    body: Bytes,
) -> (StatusCode, Json<SearchResponse>)
where
    S: VectorStore + 'static,
    E: Embedder + 'static,
    L: LanguageModel + 'static,
{
    let request: AskRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(SearchResponse::failure(format!("invalid request body: {e}"))),
            );
        }
    };

    // Reject blank questions before constructing any provider.
    if let Err(e) = validate_question(&request.question) {
        return (StatusCode::OK, Json(SearchResponse::failure(e.to_string())));
    }

    let providers = match state.acquire_providers().await {
        Ok(p) => p,
        Err(e) => {
            return (
                StatusCode::OK,
                Json(SearchResponse::failure(PipelineError::Init(e).to_string())),
            );
        }
    };

    match search_documents(&providers, &request.question, state.config.retrieval.top_k).await {
        Ok(details) => (StatusCode::OK, Json(SearchResponse::ok(details))),
        Err(e) => (StatusCode::OK, Json(SearchResponse::failure(e.to_string()))),
    }
}

/// `POST /api/generate` — phase two: answer a question against caller-provided
/// context documents.
pub async fn generate_handler<S, E, L>(
    State(state): State<Arc<AppState<S, E, L>>>,
    body: Bytes,
) -> (StatusCode, Json<GenerateResponse>)
where
    S: VectorStore + 'static,
    E: Embedder + 'static,
    L: LanguageModel + 'static,
{
    let request: GenerateRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(GenerateResponse::failure(format!("invalid request body: {e}"))),
            );
        }
    };

    if let Err(e) = validate_question(&request.question) {
        return (StatusCode::OK, Json(GenerateResponse::failure(e.to_string())));
    }

    let providers = match state.acquire_providers().await {
        Ok(p) => p,
        Err(e) => {
            return (
                StatusCode::OK,
                Json(GenerateResponse::failure(PipelineError::Init(e).to_string())),
            );
        }
    };

    match generate_answer(&providers, &request.question, &request.documents).await {
        Ok(answer) => (
            StatusCode::OK,
            Json(GenerateResponse {
                success: true,
                answer: Some(answer.text),
                latency_ms: Some(answer.latency_ms),
                error: None,
            }),
        ),
        Err(e) => (StatusCode::OK, Json(GenerateResponse::failure(e.to_string()))),
    }
}

/// `POST /api/ask` — the atomic shape: search then generate in one call.
pub async fn ask_handler<S, E, L>(
    State(state): State<Arc<AppState<S, E, L>>>,
    body: Bytes,
) -> (StatusCode, Json<AskResponse>)
where
    S: VectorStore + 'static,
    E: Embedder + 'static,
    L: LanguageModel + 'static,
{
    let request: AskRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(AskResponse::failure(format!("invalid request body: {e}"))),
            );
        }
    };

    if let Err(e) = validate_question(&request.question) {
        return (StatusCode::OK, Json(AskResponse::failure(e.to_string())));
    }

    let providers = match state.acquire_providers().await {
        Ok(p) => p,
        Err(e) => {
            return (
                StatusCode::OK,
                Json(AskResponse::failure(PipelineError::Init(e).to_string())),
            );
        }
    };

    match answer_question(&providers, &request.question, state.config.retrieval.top_k).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(AskResponse {
                success: true,
                details: Some(outcome.details),
                answer: Some(outcome.answer),
                latency_ms: Some(outcome.latency_ms),
                error: None,
            }),
        ),
        Err(e) => (StatusCode::OK, Json(AskResponse::failure(e.to_string()))),
    }
}
