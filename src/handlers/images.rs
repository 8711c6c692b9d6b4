use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    error::{AppError, Result},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    pub url: Option<String>,
}

/// Streams a stored NocoDB attachment to the browser, adding the API token
/// server-side. Only URLs under the configured NocoDB base are fetched.
pub async fn proxy_image(
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
) -> Result<impl IntoResponse> {
    let url = query
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| AppError::Validation("URL de imagen requerida".to_string()))?;

    if !state.nocodb.owns_url(&url) {
        tracing::warn!("🚫 Refusing to proxy foreign URL: {}", url);
        return Err(AppError::Validation("URL de imagen no válida".to_string()));
    }

    let (bytes, content_type) = state.nocodb.fetch_file(&url).await?;
    tracing::debug!("🖼️ Proxied {} ({} bytes)", url, bytes.len());

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CACHE_CONTROL,
                "public, max-age=31536000, immutable".to_string(),
            ),
        ],
        bytes,
    ))
}
