use std::env;
use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

use super::gateway::{
    FragmentStream, GenerateError, GenerateFuture, GenerateRequest, GenerationClient,
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

impl GeminiConfig {
    pub fn from_env() -> Result<Self, GeminiConfigError> {
        let base_url = optional_trimmed_env("GEMINI_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(GeminiConfigError::InvalidConfiguration(
                "GEMINI_BASE_URL must start with http:// or https://".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            api_key: optional_trimmed_env("GEMINI_API_KEY"),
            timeout_ms: parse_u64_env("GEMINI_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?,
        })
    }
}

#[derive(Debug, Error)]
pub enum GeminiConfigError {
    #[error("invalid integer in env var {key}: {value}")]
    ParseInt { key: String, value: String },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("failed to build Gemini http client: {0}")]
    HttpClient(String),
}

pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    /// Returns `Ok(None)` when no API key is configured; the caller degrades
    /// chat to an inline error response instead of refusing to start.
    pub fn from_config(config: GeminiConfig) -> Result<Option<Self>, GeminiConfigError> {
        let Some(api_key) = config.api_key else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS))
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| GeminiConfigError::HttpClient(err.to_string()))?;

        Ok(Some(Self {
            client,
            base_url: config.base_url,
            api_key,
        }))
    }
}

impl GenerationClient for GeminiClient {
    fn stream_generate<'a>(&'a self, request: GenerateRequest) -> GenerateFuture<'a> {
        Box::pin(async move {
            let url = format!(
                "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
                self.base_url, request.model
            );

            let response = self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&build_request_body(&request))
                .send()
                .await
                .map_err(|err| {
                    if err.is_timeout() {
                        GenerateError::Timeout
                    } else {
                        GenerateError::ProviderFailure("request_unavailable".to_string())
                    }
                })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let provider_code = parse_provider_error_code(&body);
                return Err(GenerateError::ProviderFailure(format!(
                    "status={} code={provider_code}",
                    status.as_u16()
                )));
            }

            let fragments = response
                .bytes_stream()
                .eventsource()
                .map(|event| match event {
                    Ok(event) => fragment_from_event(&event.data),
                    Err(err) => Some(Err(GenerateError::ProviderFailure(format!(
                        "stream interrupted: {err}"
                    )))),
                })
                .filter_map(futures::future::ready);

            Ok(Box::pin(fragments) as FragmentStream)
        })
    }
}

fn build_request_body(request: &GenerateRequest) -> Value {
    let mut body = json!({
        "contents": [
            { "role": "user", "parts": [{ "text": request.prompt }] }
        ],
        "generationConfig": { "temperature": request.temperature },
    });

    if !request.system_instruction.trim().is_empty() {
        body["systemInstruction"] = json!({
            "parts": [{ "text": request.system_instruction }]
        });
    }

    body
}

/// Maps one SSE event to a fragment. Chunks that carry no candidate text
/// (keepalives, usage metadata) are skipped rather than surfaced as errors.
fn fragment_from_event(data: &str) -> Option<Result<String, GenerateError>> {
    let chunk: StreamChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(_) => {
            return Some(Err(GenerateError::InvalidProviderPayload(
                "event_not_json".to_string(),
            )));
        }
    };

    if let Some(error) = chunk.error {
        let message = error.message.unwrap_or_else(|| "unknown".to_string());
        return Some(Err(GenerateError::ProviderFailure(message)));
    }

    if let Some(feedback) = chunk.prompt_feedback
        && let Some(reason) = feedback.block_reason
    {
        return Some(Err(GenerateError::ProviderFailure(format!(
            "prompt blocked: {reason}"
        ))));
    }

    let text: String = chunk
        .candidates
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| part.text)
        .collect();

    if text.is_empty() { None } else { Some(Ok(text)) }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    candidates: Option<Vec<StreamCandidate>>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
struct StreamCandidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ContentPart>>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkError {
    message: Option<String>,
}

fn parse_provider_error_code(body: &str) -> String {
    #[derive(Deserialize)]
    struct ProviderErrorEnvelope {
        error: Option<ProviderErrorDetails>,
    }

    #[derive(Deserialize)]
    struct ProviderErrorDetails {
        status: Option<String>,
        code: Option<Value>,
    }

    let parsed = serde_json::from_str::<ProviderErrorEnvelope>(body).ok();
    let Some(details) = parsed.and_then(|envelope| envelope.error) else {
        return "unknown".to_string();
    };

    if let Some(status) = details.status {
        return status;
    }

    match details.code {
        Some(Value::String(code)) => code,
        Some(Value::Number(code)) => code.to_string(),
        _ => "unknown".to_string(),
    }
}

fn optional_trimmed_env(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn parse_u64_env(key: &str, default: u64) -> Result<u64, GeminiConfigError> {
    match optional_trimmed_env(key) {
        Some(value) => value
            .parse::<u64>()
            .map_err(|_| GeminiConfigError::ParseInt {
                key: key.to_string(),
                value,
            }),
        None => Ok(default),
    }
}
