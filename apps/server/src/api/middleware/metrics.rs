//! Request counters

use axum::{extract::Request, middleware::Next, response::Response};

use crate::metrics::HTTP_REQUESTS;

pub async fn http_metrics_middleware(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let response = next.run(req).await;
    HTTP_REQUESTS
        .with_label_values(&[method.as_str(), response.status().as_str()])
        .inc();
    response
}
