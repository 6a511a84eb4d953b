//! Request observation middleware.
//!
//! Every request gets a correlation id (taken from `x-request-id` or freshly
//! generated), which is echoed on the response. Completion is logged and
//! counted under the matched route rather than the raw path, so path ids do
//! not explode metric cardinality.

use axum::{
    extract::{MatchedPath, Request},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use uuid::Uuid;

use crate::{logging, metrics};

/// Header name for request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request id stored in request extensions for handlers
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

fn get_or_generate_request_id(headers: &axum::http::HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Tag, time, log and count one request
pub async fn observe_requests(mut request: Request, next: Next) -> Response {
    let request_id = get_or_generate_request_id(request.headers());
    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let started = Instant::now();
    let mut response = next.run(request).await;
    let elapsed = started.elapsed();
    let duration_ms = elapsed.as_millis() as u64;
    let status = response.status().as_u16();

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, header_value);
    }

    metrics::http_requests_total(&method, &path, status);
    metrics::http_request_duration_ms(&method, &path, elapsed.as_secs_f64() * 1000.0);
    logging::log_api_request(&request_id, &method, &path, status, duration_ms);
    logging::log_performance("http_request", duration_ms, Some(&path));

    response
}
