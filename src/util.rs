//! Shared helpers for the keyward service.

use axum::http::HeaderMap;
use serde_json::Value;

/// Extract a Bearer token from the Authorization header.
///
/// Returns the token string without the "Bearer " prefix, or None if the
/// header is missing, malformed, or empty after the prefix.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Read a positive count from a JSON value that may be a number or a
/// numeric string. Anything else, including values below 1, is None and
/// the caller falls back to its default.
pub fn lenient_count(value: Option<&Value>) -> Option<u32> {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|v| *v >= 1)
}
