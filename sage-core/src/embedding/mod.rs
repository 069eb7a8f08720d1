use std::fmt;
use std::future::Future;

/// Errors that can occur during embedding.
#[derive(Debug)]
pub enum EmbedError {
    /// No standalone embedding provider is configured; the vector store
    /// embeds internally.
    Disabled(String),
    /// Network-level failure (DNS, timeout, connection reset, etc.)
    Network(String),
    /// The embedding endpoint returned a failure status.
    Http {
        status: u16,
        status_text: String,
        message: String,
    },
    /// Response could not be parsed.
    MalformedResponse(String),
}

impl fmt::Display for EmbedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled(msg) => write!(f, "embedding disabled: {msg}"),
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::Http {
                status,
                status_text,
                message,
            } => write!(f, "embedding request failed: {status} {status_text}: {message}"),
            Self::MalformedResponse(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

impl std::error::Error for EmbedError {}

/// Trait abstracting text-to-vector embedding.
pub trait Embedder: Send + Sync {
    /// Embed a single text into a fixed-length vector.
    fn get_embedding(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<Vec<f32>, EmbedError>> + Send;
}
