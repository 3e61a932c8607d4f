//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Conversation engine (messages, session outcomes)
//! - Library manager backends (requests, latency, add attempts)
//! - Voice transcription

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Conversation Metrics
// =============================================================================

/// Inbound messages by input type.
pub static MESSAGES_HANDLED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mediarequest_messages_handled_total",
            "Total inbound chat messages handled",
        ),
        &["input"], // "text", "voice", "command"
    )
    .unwrap()
});

/// How sessions ended.
pub static SESSION_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mediarequest_session_outcomes_total",
            "Conversation sessions by outcome",
        ),
        &["outcome"], // "done", "cancelled", "expired", "replaced", "no_results", "failed"
    )
    .unwrap()
});

/// Unexpected failures caught at the message boundary.
pub static MESSAGE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mediarequest_message_failures_total",
            "Unexpected errors converted to a generic reply",
        ),
        &["reason"],
    )
    .unwrap()
});

// =============================================================================
// Backend Metrics
// =============================================================================

/// Backend requests by backend, operation and result.
pub static BACKEND_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mediarequest_backend_requests_total",
            "Requests to library manager backends",
        ),
        &["backend", "operation", "result"], // result: "success", "error"
    )
    .unwrap()
});

/// Backend request duration in seconds.
pub static BACKEND_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "mediarequest_backend_duration_seconds",
            "Duration of library manager requests",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["backend", "operation"],
    )
    .unwrap()
});

/// Add attempts by kind and result.
pub static ADD_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediarequest_add_attempts_total", "Add calls issued"),
        &["kind", "result"], // "added", "already_exists", "unavailable", "rejected"
    )
    .unwrap()
});

// =============================================================================
// Voice Metrics
// =============================================================================

/// Transcriptions by result.
pub static TRANSCRIPTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mediarequest_transcriptions_total",
            "Voice transcriptions by result",
        ),
        &["result"], // "success", "failed", "disabled"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Record one backend call.
pub fn record_backend_call(backend: &str, operation: &str, ok: bool, seconds: f64) {
    let result = if ok { "success" } else { "error" };
    BACKEND_REQUESTS
        .with_label_values(&[backend, operation, result])
        .inc();
    BACKEND_DURATION
        .with_label_values(&[backend, operation])
        .observe(seconds);
}

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Conversation
        Box::new(MESSAGES_HANDLED.clone()),
        Box::new(SESSION_OUTCOMES.clone()),
        Box::new(MESSAGE_FAILURES.clone()),
        // Backends
        Box::new(BACKEND_REQUESTS.clone()),
        Box::new(BACKEND_DURATION.clone()),
        Box::new(ADD_ATTEMPTS.clone()),
        // Voice
        Box::new(TRANSCRIPTIONS.clone()),
    ]
}
