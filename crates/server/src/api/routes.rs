use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::{chats, handlers, middleware::metrics_middleware};
use crate::state::AppState;

/// Largest accepted voice upload.
const MAX_VOICE_BYTES: usize = 20 * 1024 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Chats
        .route("/chats/{chat_id}/messages", post(chats::post_message))
        .route(
            "/chats/{chat_id}/voice",
            post(chats::post_voice).layer(DefaultBodyLimit::max(MAX_VOICE_BYTES)),
        )
        .route(
            "/chats/{chat_id}/session",
            get(chats::get_session).delete(chats::delete_session),
        )
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .with_state(state)
}
