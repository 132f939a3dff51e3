use std::future::Future;
use std::pin::Pin;

use futures::Stream;
use thiserror::Error;

/// Text fragments of one generation, in arrival order. Finite, and not
/// restartable: a failed stream can only be retried as a new request.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, GenerateError>> + Send>>;

pub type GenerateFuture<'a> =
    Pin<Box<dyn Future<Output = Result<FragmentStream, GenerateError>> + Send + 'a>>;

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub temperature: f64,
    pub system_instruction: String,
    pub prompt: String,
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("generation request timed out")]
    Timeout,
    #[error("generation provider request failed: {0}")]
    ProviderFailure(String),
    #[error("generation provider returned an invalid payload: {0}")]
    InvalidProviderPayload(String),
}

pub trait GenerationClient: Send + Sync {
    fn stream_generate<'a>(&'a self, request: GenerateRequest) -> GenerateFuture<'a>;
}
