//! API Middleware
//!
//! Caller identification and request logging.

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::domain::OperationContext;

/// Header carrying the authenticated caller, set by the upstream gateway
pub const REQUEST_USER_HEADER: &str = "X-Request-User-Id";

/// Header carrying an optional caller-supplied correlation id
pub const CORRELATION_HEADER: &str = "X-Correlation-Id";

/// Request user from X-Request-User-Id header
#[derive(Debug, Clone, Copy)]
pub struct RequestUser {
    pub user_id: Uuid,
}

// =========================================================================
// Caller identity
// =========================================================================

/// Resolve the caller and build the operation context.
///
/// A missing `X-Request-User-Id` is allowed here; routes that need a caller
/// reject the request themselves. A malformed one is rejected outright.
pub async fn identity_middleware(mut request: Request<Body>, next: Next) -> Result<Response, Response> {
    let headers = request.headers();

    let request_user = match headers.get(REQUEST_USER_HEADER).map(|v| v.to_str()) {
        None => None,
        Some(Ok(raw)) => match Uuid::parse_str(raw.trim()) {
            Ok(user_id) => Some(RequestUser { user_id }),
            Err(_) => return Err(invalid_user_id()),
        },
        Some(Err(_)) => return Err(invalid_user_id()),
    };

    let mut context = OperationContext::new();
    if let Some(correlation_id) = headers
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
    {
        context = context.with_correlation_id(correlation_id);
    }
    context.ensure_correlation_id();

    if let Some(user) = request_user {
        context = context.with_request_user(user.user_id);
        request.extensions_mut().insert(user);
    }
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

fn invalid_user_id() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": "Invalid X-Request-User-Id header format",
            "error_code": "invalid_user_id"
        })),
    )
        .into_response()
}

// =========================================================================
// mask_headers_for_logging
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["authorization", "proxy-authorization", "cookie", "set-cookie"];

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
// Request Logging Middleware
// =========================================================================

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let version = request.version();

    let headers = mask_headers_for_logging(request.headers());

    let correlation_id = request
        .extensions()
        .get::<OperationContext>()
        .and_then(|ctx| ctx.correlation_id);

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        version = ?version,
        correlation_id = ?correlation_id,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %status,
        duration_ms = %duration.as_millis(),
        correlation_id = ?correlation_id,
        "Request completed"
    );

    response
}
