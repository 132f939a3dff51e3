use axum::routing::{delete, get, post};
use axum::{Router, middleware};
use shared::config::HistoryReadFailure;
use shared::relay::ChatRelay;
use shared::repos::Store;
use uuid::Uuid;

mod authn;
mod chat;
mod errors;
mod health;
mod history;
mod page;
mod session;
mod settings;
mod tokens;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub relay: ChatRelay,
    pub session_ttl_seconds: u64,
    pub history_read_failure: HistoryReadFailure,
}

#[derive(Clone, Copy)]
pub(super) struct ChatSession {
    pub(super) session_id: Uuid,
}

pub fn build_router(app_state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(page::chat_page))
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/v1/session", post(session::create_session))
        .with_state(app_state.clone());

    let auth_layer_state = app_state.clone();

    let protected_routes = Router::new()
        .route("/v1/chat/stream", post(chat::stream_chat))
        .route(
            "/v1/settings",
            get(settings::get_settings).put(settings::update_settings),
        )
        .route("/v1/history", get(history::list_history))
        .route("/v1/history/{turn_id}", delete(history::delete_turn))
        .layer(middleware::from_fn_with_state(
            auth_layer_state,
            authn::auth_middleware,
        ))
        .with_state(app_state);

    public_routes.merge(protected_routes)
}
