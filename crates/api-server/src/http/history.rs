use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use shared::config::HistoryReadFailure;
use shared::models::{HistoryResponse, OkResponse};
use shared::repos::TurnOrder;
use tracing::warn;
use uuid::Uuid;

use super::errors::{
    bad_request_response, not_found_response, service_unavailable_response, store_error_response,
};
use super::{AppState, ChatSession};

const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub(super) struct HistoryQuery {
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    order: Option<String>,
}

pub(super) async fn list_history(
    State(state): State<AppState>,
    Extension(session): Extension<ChatSession>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);

    let order = match query.order.as_deref() {
        None | Some("asc") => TurnOrder::Ascending,
        Some("desc") => TurnOrder::Descending,
        Some(_) => {
            return bad_request_response("invalid_order", "order must be \"asc\" or \"desc\"");
        }
    };

    match state.store.list_turns(session.session_id, limit, order).await {
        Ok(turns) => (StatusCode::OK, Json(HistoryResponse { turns })).into_response(),
        Err(err) => match state.history_read_failure {
            HistoryReadFailure::Degrade => {
                warn!(session_id = %session.session_id, "history read failed, serving empty history: {err}");
                (StatusCode::OK, Json(HistoryResponse { turns: Vec::new() })).into_response()
            }
            HistoryReadFailure::Fail => service_unavailable_response(
                "history_unavailable",
                "Conversation history is temporarily unavailable",
            ),
        },
    }
}

pub(super) async fn delete_turn(
    State(state): State<AppState>,
    Extension(session): Extension<ChatSession>,
    Path(turn_id): Path<Uuid>,
) -> Response {
    match state.store.delete_turn(session.session_id, turn_id).await {
        Ok(true) => (StatusCode::OK, Json(OkResponse { ok: true })).into_response(),
        Ok(false) => not_found_response("turn_not_found", "No such turn in this session"),
        Err(err) => store_error_response(err),
    }
}
