//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the media request server:
//! - HTTP request metrics (latency, counts)
//! - Chat replies by kind
//! - Active conversation sessions (collected dynamically)
//!
//! Core metrics (backends, sessions, voice) are registered alongside.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use regex_lite::Regex;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "mediarequest_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediarequest_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "mediarequest_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Chat Metrics
// =============================================================================

/// Replies sent, by reply kind.
pub static CHAT_REPLIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediarequest_chat_replies_total", "Chat replies by kind"),
        &["kind"],
    )
    .unwrap()
});

/// Chats with a request in progress (collected dynamically).
pub static ACTIVE_SESSIONS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "mediarequest_active_sessions",
        "Chats with a request in progress",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Chat
    registry
        .register(Box::new(CHAT_REPLIES_TOTAL.clone()))
        .unwrap();
    registry.register(Box::new(ACTIVE_SESSIONS.clone())).unwrap();

    // Core metrics (conversation, backends, voice)
    for metric in mediarequest_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    ACTIVE_SESSIONS.set(state.engine().active_sessions().await as i64);
}

static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/-?\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace chat ids with placeholders).
pub fn normalize_path(path: &str) -> String {
    NUMERIC_SEGMENT.replace_all(path, "/{id}$1").to_string()
}
