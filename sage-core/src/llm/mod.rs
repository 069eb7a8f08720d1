use std::fmt;
use std::future::Future;
use std::time::Duration;

/// A completed language-model call: the generated text plus the wall-clock
/// time the call took.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub latency: Duration,
}

/// Errors that can occur when calling a language-model provider.
#[derive(Debug)]
pub enum LlmError {
    /// Network-level failure (DNS, timeout, connection reset, etc.)
    Network(String),
    /// The upstream API returned a failure status.
    Http {
        status: u16,
        status_text: String,
        message: String,
    },
    /// Response could not be parsed.
    MalformedResponse(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::Http {
                status,
                status_text,
                message,
            } => write!(f, "language model request failed: {status} {status_text}: {message}"),
            Self::MalformedResponse(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

impl std::error::Error for LlmError {}

/// Trait abstracting language-model generation.
///
/// Implementations measure wall-clock latency around the call and return it
/// in the `Generation`.
pub trait LanguageModel: Send + Sync {
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<Generation, LlmError>> + Send;
}
