use axum::{extract::State, http::header, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use mediarequest_core::SanitizedConfig;

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub voice_enabled: bool,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        voice_enabled: state.engine().voice_enabled(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// Prometheus text exposition
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state).await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
