use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shared::models::UpdateSettingsRequest;

use super::errors::store_error_response;
use super::{AppState, ChatSession};

pub(super) async fn get_settings(
    State(state): State<AppState>,
    Extension(session): Extension<ChatSession>,
) -> Response {
    match state.store.get_or_create_settings(session.session_id).await {
        Ok(settings) => (StatusCode::OK, Json(settings)).into_response(),
        Err(err) => store_error_response(err),
    }
}

pub(super) async fn update_settings(
    State(state): State<AppState>,
    Extension(session): Extension<ChatSession>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Response {
    match state.store.merge_settings(session.session_id, req).await {
        Ok(settings) => (StatusCode::OK, Json(settings)).into_response(),
        Err(err) => store_error_response(err),
    }
}
