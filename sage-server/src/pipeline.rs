//! The two-phase query pipeline: search the vector store, then condition the
//! language model on what was retrieved.
//!
//! Two invocation shapes are supported. `answer_question` runs both phases
//! and returns one outcome; `search_documents` + `generate_answer` are
//! independently callable so the UI can render retrieval results while
//! generation is still in flight.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use sage_core::embedding::{EmbedError, Embedder};
use sage_core::llm::{LanguageModel, LlmError};
use sage_core::store::{Query, StoreError, VectorStore};

use crate::provider::{ProviderInitError, Providers};

const PROMPT_INSTRUCTION: &str =
    "Answer the question using only the provided context. If the context does not contain the answer, say that you don't know.";

/// Assemble the generation prompt: instruction, newline-joined context
/// documents, then the literal question.
pub fn build_prompt(documents: &[String], question: &str) -> String {
    format!(
        "{PROMPT_INSTRUCTION}\n\nContext:\n{}\n\nQuestion: {question}\nAnswer:",
        documents.join("\n")
    )
}

/// Reject blank questions before any provider work happens.
pub fn validate_question(question: &str) -> Result<&str, PipelineError> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::Validation(
            "question must not be empty".into(),
        ));
    }
    Ok(trimmed)
}

/// Where and how a question failed on its way through the pipeline.
#[derive(Debug)]
pub enum PipelineError {
    /// Rejected before any provider work.
    Validation(String),
    /// The provider singletons could not be constructed.
    Init(ProviderInitError),
    /// The question could not be embedded.
    Embedding(EmbedError),
    /// The vector store query failed.
    Search(StoreError),
    /// The search came back empty. An ungrounded answer is worse than no
    /// answer, so this is a failure rather than an empty success.
    NoResults,
    /// The language-model call failed.
    Generation(LlmError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "{msg}"),
            Self::Init(e) => write!(f, "provider initialization failed: {e}"),
            Self::Embedding(e) => write!(f, "failed to embed question: {e}"),
            Self::Search(e) => write!(f, "search failed: {e}"),
            Self::NoResults => write!(f, "no relevant information found"),
            Self::Generation(e) => write!(f, "failed to generate an answer: {e}"),
        }
    }
}

impl std::error::Error for PipelineError {}

/// What retrieval produced for a question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagDetails {
    pub documents: Vec<String>,
    pub ids: Vec<String>,
    /// Per-document similarity, `max(0, 1 − distance)`.
    pub similarities: Vec<f32>,
    pub processing_time_ms: u64,
    pub result_count: usize,
}

/// A generated answer plus the language-model latency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub text: String,
    pub latency_ms: u64,
}

/// The combined outcome of search followed by generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerOutcome {
    pub details: RagDetails,
    pub answer: String,
    pub latency_ms: u64,
}

/// Phase one: embed (or forward) the question and query the vector store.
pub async fn search_documents<S, E, L>(
    providers: &Providers<S, E, L>,
    question: &str,
    top_k: usize,
) -> Result<RagDetails, PipelineError>
where
    S: VectorStore,
    E: Embedder,
    L: LanguageModel,
{
    let question = validate_question(question)?;
    let started = Instant::now();
    let request_id = uuid::Uuid::new_v4();
    tracing::debug!(%request_id, question, "searching vector store");

    let query = match providers.embedder.get_embedding(question).await {
        Ok(vector) => Query::Vector(vector),
        // The store embeds internally; hand it the raw text.
        Err(EmbedError::Disabled(_)) => Query::Text(question.to_string()),
        Err(e) => return Err(PipelineError::Embedding(e)),
    };

    let result = providers
        .store
        .query(query, top_k)
        .await
        .map_err(PipelineError::Search)?;
    if result.is_empty() {
        return Err(PipelineError::NoResults);
    }

    let similarities = result
        .distances
        .iter()
        .map(|d| (1.0 - d).max(0.0))
        .collect();
    let result_count = result.len();
    tracing::debug!(%request_id, result_count, "search complete");

    Ok(RagDetails {
        documents: result.documents,
        ids: result.ids,
        similarities,
        processing_time_ms: started.elapsed().as_millis() as u64,
        result_count,
    })
}

/// Phase two: assemble the prompt from the given context and call the
/// language model.
pub async fn generate_answer<S, E, L>(
    providers: &Providers<S, E, L>,
    question: &str,
    documents: &[String],
) -> Result<Answer, PipelineError>
where
    S: VectorStore,
    E: Embedder,
    L: LanguageModel,
{
    let question = validate_question(question)?;
    let prompt = build_prompt(documents, question);

    let generation = providers
        .llm
        .generate(&prompt)
        .await
        .map_err(PipelineError::Generation)?;

    Ok(Answer {
        text: generation.text,
        latency_ms: generation.latency.as_millis() as u64,
    })
}

/// Both phases as one atomic call. Generation only runs when the search
/// produced at least one document.
pub async fn answer_question<S, E, L>(
    providers: &Providers<S, E, L>,
    question: &str,
    top_k: usize,
) -> Result<AnswerOutcome, PipelineError>
where
    S: VectorStore,
    E: Embedder,
    L: LanguageModel,
{
    let details = search_documents(providers, question, top_k).await?;
    let answer = generate_answer(providers, question, &details.documents).await?;
    Ok(AnswerOutcome {
        details,
        answer: answer.text,
        latency_ms: answer.latency_ms,
    })
}
