use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::AppError;

pub const EXPECTED_JSON_MESSAGE: &str = "Se esperaba un cuerpo JSON";
pub const INVALID_JSON_MESSAGE: &str = "Cuerpo JSON inválido";

/// A JSON body, decoded and encoded with `sonic_rs`.
///
/// As an extractor it rejects with [`AppError::Validation`], so malformed
/// payloads get the same `{"error": ...}` body as every other failure.
pub struct Json<T>(pub T);

fn has_json_content_type(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
    else {
        return false;
    };
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    essence.eq_ignore_ascii_case("application/json") || essence.ends_with("+json")
}

impl<T, S> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !has_json_content_type(req.headers()) {
            return Err(AppError::Validation(EXPECTED_JSON_MESSAGE.to_string()));
        }

        let body = Bytes::from_request(req, state).await.map_err(|e| {
            tracing::debug!("Could not read request body: {}", e);
            AppError::Validation(INVALID_JSON_MESSAGE.to_string())
        })?;

        sonic_rs::from_slice(&body).map(Json).map_err(|e| {
            tracing::debug!("Rejected JSON body: {}", e);
            AppError::Validation(INVALID_JSON_MESSAGE.to_string())
        })
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match sonic_rs::to_string(&self.0) {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                body,
            )
                .into_response(),
            Err(e) => AppError::Json(e).into_response(),
        }
    }
}
