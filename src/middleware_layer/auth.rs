use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;

use crate::{
    crypto::token::TokenManager,
    error::{AppError, Result},
    models::user::SessionUser,
    policy::Operation,
    state::AppState,
};

/// Name of the session cookie.
pub const TOKEN_COOKIE: &str = "token";

/// Middleware state: the token verifier and the operation a route group runs.
#[derive(Clone)]
pub struct Gate {
    tokens: TokenManager,
    operation: Operation,
}

impl Gate {
    pub fn new(state: &AppState, operation: Operation) -> Self {
        Self {
            tokens: state.tokens.clone(),
            operation,
        }
    }
}

/// Extracts the session token. The cookie wins over an `Authorization` header.
pub fn extract_token(cookies: &Cookies, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = cookies.get(TOKEN_COOKIE) {
        let value = cookie.value().trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Decides whether a credential may run `operation`.
///
/// Checks run in a fixed order: the token must verify, the embedded account
/// must be active, then the role must be allowed. An expired token is a 401
/// even when its role would not have been allowed.
pub fn authorize(
    tokens: &TokenManager,
    token: Option<&str>,
    operation: Operation,
) -> Result<SessionUser> {
    let token =
        token.ok_or_else(|| AppError::Unauthenticated("no session token".to_string()))?;
    let claims = tokens.verify(token)?;

    if !claims.estado.is_active() {
        return Err(AppError::Unauthenticated(format!(
            "user {} is {}",
            claims.sub,
            claims.estado.as_str()
        )));
    }

    if !operation.permits(claims.rol) {
        tracing::warn!(
            "⛔ User {} ({}) denied {} [jti {}]",
            claims.sub,
            claims.rol,
            operation,
            claims.jti
        );
        return Err(AppError::Forbidden);
    }

    tracing::debug!("✅ User {} allowed {}", claims.sub, operation);
    Ok(claims.session_user())
}

/// A middleware that lets the request through only if the caller may run the
/// gate's operation. The caller's [`SessionUser`] is added to the request
/// extensions.
pub async fn require_permission(
    State(gate): State<Gate>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    let token = extract_token(&cookies, request.headers());
    let user = authorize(&gate.tokens, token.as_deref(), gate.operation)?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
