//! Metrics middleware for API routes.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::{
    normalize_path, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION,
};

/// Metrics middleware that tracks HTTP request duration and counts.
///
/// This middleware records:
/// - Request duration (histogram)
/// - Request count (counter)
/// - Requests in flight (gauge)
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    async fn dummy_handler() -> &'static str {
        "OK"
    }

    #[tokio::test]
    async fn test_requests_are_counted_by_normalized_path() {
        let app = Router::new()
            .route("/api/v1/chats/{id}/session", get(dummy_handler))
            .layer(middleware::from_fn(metrics_middleware));

        let before = HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/api/v1/chats/{id}/session", "200"])
            .get();

        let request = Request::builder()
            .uri("/api/v1/chats/987654/session")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let after = HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/api/v1/chats/{id}/session", "200"])
            .get();
        assert!(after > before);
    }
}
