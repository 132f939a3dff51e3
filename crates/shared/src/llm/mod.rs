mod gateway;
mod gemini;
pub mod prompts;

pub use gateway::{
    FragmentStream, GenerateError, GenerateFuture, GenerateRequest, GenerationClient,
};
pub use gemini::{GeminiClient, GeminiConfig, GeminiConfigError};
