use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::info;

pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let status = response.status();
    info!(
        target: "metrics",
        method = %method,
        path = %path,
        status = %status.as_u16(),
        latency_ms = %start.elapsed().as_millis(),
        "request_completed"
    );

    response
}
