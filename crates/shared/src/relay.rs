//! Streaming relay: mediates between one inbound chat request and one
//! outbound generation call, forwarding fragments as they arrive and
//! persisting the full exchange once the stream completes.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::llm::prompts::compose_prompt;
use crate::llm::{GenerateError, GenerateRequest, GenerationClient};
use crate::models::KnowledgeFile;
use crate::repos::StoreError;

pub type LogAppendFuture<'a> =
    Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

/// Where completed exchanges are recorded. `Store` is the production
/// implementation; tests inject an in-memory recorder.
pub trait ConversationLog: Send + Sync {
    fn append_exchange<'a>(
        &'a self,
        session_id: Uuid,
        user_text: &'a str,
        model_text: &'a str,
    ) -> LogAppendFuture<'a>;
}

#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub session_id: Uuid,
    pub prompt: String,
    pub model: String,
    pub temperature: f64,
    pub system_instruction: String,
    pub knowledge: Vec<KnowledgeFile>,
}

#[derive(Clone)]
pub struct ChatRelay {
    generation: Option<Arc<dyn GenerationClient>>,
    log: Arc<dyn ConversationLog>,
}

const MISSING_CLIENT_FRAGMENT: &str =
    "The server has no generation API key configured, so chat is unavailable.";

impl ChatRelay {
    pub fn new(
        generation: Option<Arc<dyn GenerationClient>>,
        log: Arc<dyn ConversationLog>,
    ) -> Self {
        Self { generation, log }
    }

    /// Runs one prompt-completion exchange. The returned stream yields text
    /// fragments in arrival order and ends when generation ends; any failure
    /// surfaces as a single readable fragment and nothing is persisted.
    ///
    /// Cancelling the token, or dropping the returned stream, stops provider
    /// consumption and skips persistence.
    pub fn execute(
        &self,
        request: RelayRequest,
        cancel: CancellationToken,
    ) -> UnboundedReceiverStream<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        let generation = self.generation.clone();
        let log = Arc::clone(&self.log);

        tokio::spawn(run_exchange(generation, log, request, cancel, tx));

        UnboundedReceiverStream::new(rx)
    }
}

async fn run_exchange(
    generation: Option<Arc<dyn GenerationClient>>,
    log: Arc<dyn ConversationLog>,
    request: RelayRequest,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<String>,
) {
    let Some(client) = generation else {
        warn!(session_id = %request.session_id, "chat request without a configured generation client");
        let _ = tx.send(MISSING_CLIENT_FRAGMENT.to_string());
        return;
    };

    let generate = client.stream_generate(GenerateRequest {
        model: request.model.clone(),
        temperature: request.temperature,
        system_instruction: request.system_instruction.clone(),
        prompt: compose_prompt(&request.knowledge, &request.prompt),
    });

    let mut stream = tokio::select! {
        _ = cancel.cancelled() => {
            debug!(session_id = %request.session_id, "chat cancelled before generation started");
            return;
        }
        result = generate => match result {
            Ok(stream) => stream,
            Err(err) => {
                warn!(session_id = %request.session_id, "generation request failed: {err}");
                let _ = tx.send(error_fragment(&err));
                return;
            }
        },
    };

    let mut accumulated = String::new();
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(session_id = %request.session_id, "chat cancelled mid-stream");
                return;
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(fragment)) => {
                accumulated.push_str(&fragment);
                if tx.send(fragment).is_err() {
                    debug!(session_id = %request.session_id, "client went away mid-stream");
                    return;
                }
            }
            Some(Err(err)) => {
                warn!(session_id = %request.session_id, "generation failed mid-stream: {err}");
                let _ = tx.send(error_fragment(&err));
                return;
            }
            None => break,
        }
    }

    // Normal completion is the only path that writes history: a failed or
    // cancelled exchange must not leave a partial (user, model) pair behind.
    if let Err(err) = log
        .append_exchange(request.session_id, &request.prompt, &accumulated)
        .await
    {
        error!(session_id = %request.session_id, "failed to persist exchange: {err}");
    }
}

fn error_fragment(err: &GenerateError) -> String {
    format!("An error occurred while generating the response: {err}")
}
