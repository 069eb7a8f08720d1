//! Ingestion endpoints: run the embedding job and report its progress.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;

use sage_core::embedding::Embedder;
use sage_core::llm::LanguageModel;
use sage_core::store::VectorStore;

use super::{AppState, IngestRequest, IngestResponse, StatusResponse};
use crate::ingest::{ingestion_status, run_ingestion};
use crate::pipeline::PipelineError;

/// `POST /api/ingest` — embed the record collection, incrementally unless
/// `force` is set.
pub async fn ingest_handler<S, E, L>(
    State(state): State<Arc<AppState<S, E, L>>>,
    body: Bytes,
) -> (StatusCode, Json<IngestResponse>)
where
    S: VectorStore + 'static,
    E: Embedder + 'static,
    L: LanguageModel + 'static,
{
    // An empty body means a default (non-forced) run.
    let request: IngestRequest = if body.is_empty() {
        IngestRequest { force: false }
    } else {
        match serde_json::from_slice(&body) {
            Ok(r) => r,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(IngestResponse::failure(format!("invalid request body: {e}"))),
                );
            }
        }
    };

    let providers = match state.acquire_providers().await {
        Ok(p) => p,
        Err(e) => {
            return (
                StatusCode::OK,
                Json(IngestResponse::failure(PipelineError::Init(e).to_string())),
            );
        }
    };

    match run_ingestion(&providers, &state.records, request.force).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(IngestResponse {
                success: summary.success,
                message: Some(summary.message),
                processed: Some(summary.processed),
                error: None,
            }),
        ),
        Err(e) => (StatusCode::OK, Json(IngestResponse::failure(e.to_string()))),
    }
}

/// `GET /api/ingest/status` — how much of the record collection the vector
/// store already covers.
pub async fn status_handler<S, E, L>(
    State(state): State<Arc<AppState<S, E, L>>>,
) -> (StatusCode, Json<StatusResponse>)
where
    S: VectorStore + 'static,
    E: Embedder + 'static,
    L: LanguageModel + 'static,
{
    let providers = match state.acquire_providers().await {
        Ok(p) => p,
        Err(e) => {
            return (
                StatusCode::OK,
                Json(StatusResponse::failure(PipelineError::Init(e).to_string())),
            );
        }
    };

    match ingestion_status(&providers, &state.records).await {
        Ok(status) => (
            StatusCode::OK,
            Json(StatusResponse {
                success: true,
                status: Some(status),
                error: None,
            }),
        ),
        Err(e) => (StatusCode::OK, Json(StatusResponse::failure(e.to_string()))),
    }
}
