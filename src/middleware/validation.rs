use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::config::AppConfig;

/// An Axum middleware that rejects obviously malicious requests early.
///
/// This middleware checks for:
/// - Path traversal attempts in the request path or query string. Image names are
///   passed as query parameters, so `img_path=../../etc/passwd` is caught here
///   before the store ever sees it.
/// - Suspicious user agents (logged only).
/// - Declared bodies larger than `server.max_upload_bytes`.
pub async fn validate_request_middleware(
    State(cfg): State<Arc<AppConfig>>,
    req: Request,
    next: Next,
) -> Response {
    let uri = req.uri();
    let traversal = contains_path_traversal(uri.path()) || uri.query().map(contains_path_traversal).unwrap_or(false);
    if traversal {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": {
                    "code": "INVALID_PATH",
                    "message": "Path traversal detected in request",
                },
                "status": 400,
            })),
        )
            .into_response();
    }

    if let Some(ua_str) = req.headers().get("user-agent").and_then(|ua| ua.to_str().ok()) {
        if is_suspicious_user_agent(ua_str) {
            tracing::warn!("Suspicious user agent detected: {}", sanitize_for_logging(ua_str));
        }
    }

    if matches!(req.method(), &axum::http::Method::POST | &axum::http::Method::PUT) {
        let declared = req
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        let max_body_size = cfg.server.max_upload_bytes;
        if let Some(length) = declared {
            if length > max_body_size {
                return (
                    StatusCode::PAYLOAD_TOO_LARGE,
                    Json(json!({
                        "error": {
                            "code": "PAYLOAD_TOO_LARGE",
                            "message": format!("Request body exceeds maximum size of {} bytes", max_body_size),
                        },
                        "status": 413,
                    })),
                )
                    .into_response();
            }
        }
    }

    next.run(req).await
}

/// Detects `..` style traversal, plain or percent-encoded, and null bytes.
fn contains_path_traversal(value: &str) -> bool {
    let lower = value.to_lowercase();

    if value.contains("/..") || value.contains("\\..") || value.contains("../") || value.contains("..\\") {
        return true;
    }
    if value.starts_with("..") || value.contains("=..") {
        return true;
    }
    if value.contains("....") {
        return true;
    }

    let encoded_patterns = [
        "%2e%2e",
        "%252e%252e",
        "%2e/",
        "%252e%2f",
        "/%2e",
        "%2f%2e",
        "%2e%5c",
        "%5c%2e",
        "%00",
    ];
    if encoded_patterns.iter().any(|p| lower.contains(p)) {
        return true;
    }

    value.contains('\0')
}

/// Check for suspicious user agents (simple heuristic)
fn is_suspicious_user_agent(ua: &str) -> bool {
    let ua_lower = ua.to_lowercase();
    ua_lower.contains("scanner")
        || (ua_lower.contains("crawler") && !ua_lower.contains("googlebot") && !ua_lower.contains("bingbot"))
        || ua_lower.contains("nikto")
        || ua_lower.contains("sqlmap")
        || ua_lower.contains("acunetix")
}

/// Sanitizes user input for logging purposes.
///
/// Removes control characters, limits the length to 200 characters and escapes quotes.
pub fn sanitize_for_logging(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .take(200)
        .collect::<String>()
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\'', "\\\'")
}
