use axum::{http::StatusCode, response::IntoResponse};

pub async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        crate::services::metrics::get_metrics(),
    )
}
