use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};

/// Seconds after which one more login attempt becomes available to an IP.
pub const LOGIN_REPLENISH_SECS: u64 = 12;
/// Login attempts an IP may make in a burst.
pub const LOGIN_BURST: u32 = 5;

pub const TOO_MANY_ATTEMPTS_MESSAGE: &str =
    "Demasiados intentos de inicio de sesión. Intente de nuevo más tarde";

/// Rewrites the governor's plain-text 429 into the API's JSON error shape.
///
/// Rate limit headers (`retry-after`, `x-ratelimit-*`) are kept.
pub async fn json_too_many_requests(req: Request<Body>, next: Next) -> Response {
    let response = next.run(req).await;
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return response;
    }

    let (mut parts, _) = response.into_parts();
    tracing::warn!("🚫 Login rate limit exceeded");

    let body = sonic_rs::to_string(&sonic_rs::json!({ "error": TOO_MANY_ATTEMPTS_MESSAGE }))
        .unwrap_or_else(|_| format!(r#"{{"error":"{}"}}"#, TOO_MANY_ATTEMPTS_MESSAGE));

    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Response::from_parts(parts, Body::from(body))
}
