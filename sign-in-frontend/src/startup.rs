use axum::{middleware::from_fn, routing::get, Router};
use service_core::middleware::{metrics::metrics_middleware, tracing::request_id_middleware};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    app::{health_check, index},
    auth::{sign_in_page, sign_out_handler},
    metrics::metrics,
    user::current_user,
};
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/sign-in", get(sign_in_page))
        .route("/sign-out", get(sign_out_handler))
        .route("/api/me", get(current_user))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    path = %request.uri().path(),
                    version = ?request.version(),
                )
            }),
        )
        // Outermost, so the trace span sees the request id
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
