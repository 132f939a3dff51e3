use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use shared::models::CreateChatSessionResponse;

use super::AppState;
use super::errors::store_error_response;
use super::tokens::{hash_token, new_session_token};

/// Issues an anonymous chat session. The token is returned once; only its
/// hash is stored.
pub(super) async fn create_session(State(state): State<AppState>) -> Response {
    let token = new_session_token();

    match state
        .store
        .create_chat_session(
            &hash_token(&token),
            Utc::now(),
            state.session_ttl_seconds as i64,
        )
        .await
    {
        Ok(_) => (
            StatusCode::OK,
            Json(CreateChatSessionResponse {
                session_token: token,
                expires_in: state.session_ttl_seconds as u32,
            }),
        )
            .into_response(),
        Err(err) => store_error_response(err),
    }
}
