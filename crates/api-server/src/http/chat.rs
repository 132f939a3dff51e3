use std::convert::Infallible;

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::{Extension, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use shared::models::{ChatStreamRequest, UpdateSettingsRequest};
use shared::relay::RelayRequest;
use shared::repos::merged_settings;
use tokio_util::sync::CancellationToken;

use super::errors::{bad_request_response, store_error_response};
use super::{AppState, ChatSession};

/// Streams one chat exchange as a chunked `text/plain` body whose bytes are
/// the model's output fragments in arrival order.
pub(super) async fn stream_chat(
    State(state): State<AppState>,
    Extension(session): Extension<ChatSession>,
    Json(req): Json<ChatStreamRequest>,
) -> Response {
    let prompt = req.prompt.trim().to_string();
    if prompt.is_empty() {
        return bad_request_response("empty_prompt", "prompt is required");
    }

    let stored = match state.store.get_or_create_settings(session.session_id).await {
        Ok(settings) => settings,
        Err(err) => return store_error_response(err),
    };

    // Per-request fields override stored settings for this exchange only.
    let effective = match merged_settings(
        stored,
        UpdateSettingsRequest {
            model_name: req.model_name,
            temperature: req.temperature,
            system_instruction: req.system_instruction,
            knowledge_files: req.knowledge_files,
        },
    ) {
        Ok(settings) => settings,
        Err(err) => return store_error_response(err),
    };

    let cancel = CancellationToken::new();
    let fragments = state.relay.execute(
        RelayRequest {
            session_id: session.session_id,
            prompt,
            model: effective.model_name,
            temperature: effective.temperature,
            system_instruction: effective.system_instruction,
            knowledge: effective.knowledge,
        },
        cancel.clone(),
    );

    // Dropping the response body (client disconnect) drops the guard, which
    // cancels the relay so it stops requesting fragments from the provider.
    let guard = cancel.drop_guard();
    let body = Body::from_stream(fragments.map(move |fragment| {
        let _ = &guard;
        Ok::<_, Infallible>(Bytes::from(fragment))
    }));

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}
