//! API Middleware
//!
//! Request context and request logging middleware.

use std::net::IpAddr;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::domain::OperationContext;

/// Header carrying the caller's correlation id, echoed on the response
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

// =========================================================================
// Operation context
// =========================================================================

/// Attach an `OperationContext` to the request.
///
/// The correlation id is taken from `X-Correlation-Id` when it holds a UUID,
/// otherwise a fresh one is generated.
pub async fn context_middleware(mut request: Request<Body>, next: Next) -> Response {
    let mut context = OperationContext::new();
    if let Some(correlation_id) = header_uuid(request.headers(), CORRELATION_ID_HEADER) {
        context = context.with_correlation_id(correlation_id);
    }
    if let Some(ip) = forwarded_ip(request.headers()) {
        context = context.with_client_ip(ip);
    }
    let correlation_id = context.ensure_correlation_id();

    request.extensions_mut().insert(context);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&correlation_id.to_string()) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    response
}

fn header_uuid(headers: &HeaderMap, name: &str) -> Option<Uuid> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
}

/// First address of `X-Forwarded-For`
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse().ok())
}

// =========================================================================
// Header masking
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &[
    "x-api-key",
    "authorization",
    "cookie",
    "set-cookie",
    "proxy-authorization",
];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name_lower = name.as_str().to_lowercase();
            let masked_value = if SENSITIVE_HEADERS.contains(&name_lower.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

// =========================================================================
// Request logging
// =========================================================================

/// Request logging middleware. Runs inside `context_middleware`.
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = mask_headers_for_logging(request.headers());

    let context = request.extensions().get::<OperationContext>();
    let correlation_id = context.and_then(|ctx| ctx.correlation_id);
    let client_ip = context.and_then(|ctx| ctx.client_ip);

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        correlation_id = ?correlation_id,
        client_ip = ?client_ip,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    let status = response.status();
    let duration_ms = start.elapsed().as_millis();

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration_ms,
            correlation_id = ?correlation_id,
            "Request failed"
        );
    } else {
        tracing::info!(
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration_ms,
            correlation_id = ?correlation_id,
            "Request completed"
        );
    }

    response
}
