use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Message returned on every role check failure.
pub const FORBIDDEN_MESSAGE: &str = "No tienes permisos para acceder a este recurso";

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A transport error talking to NocoDB.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// NocoDB answered with a non-success status.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// A JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] sonic_rs::Error),

    /// An I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing, malformed, expired or badly signed credential, or an inactive account.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Wrong email or password at login.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The caller's role is not allowed to run the operation.
    #[error("Forbidden")]
    Forbidden,

    /// A resource not found error.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A multipart error.
    #[error("Multipart error: {0}")]
    Multipart(String),

    /// The uploaded file is not an acceptable image.
    #[error("Image error: {0}")]
    Image(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// The HTTP status this error renders as.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Http(_) | AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Json(_) | AppError::Io(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Unauthenticated(_) | AppError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::Multipart(_) | AppError::Image(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

impl From<garde::Report> for AppError {
    fn from(report: garde::Report) -> Self {
        // Field validators carry user-facing messages; the path only goes to the log.
        let message = report
            .iter()
            .next()
            .map(|(path, error)| {
                tracing::debug!("Payload rejected at {}: {}", path, error.message());
                error.message().to_string()
            })
            .unwrap_or_else(|| "Datos inválidos".to_string());
        AppError::Validation(message)
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        AppError::Multipart(e.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::Http(ref e) => {
                tracing::error!("NocoDB transport error: {}", e);
                "Error al comunicarse con NocoDB".to_string()
            }

            AppError::Upstream(ref msg) => {
                tracing::error!("NocoDB error: {}", msg);
                "Error al comunicarse con NocoDB".to_string()
            }

            AppError::Json(ref e) => {
                tracing::error!("JSON error: {}", e);
                "Error interno del servidor".to_string()
            }

            AppError::Io(ref e) => {
                tracing::error!("IO error: {}", e);
                "Error interno del servidor".to_string()
            }

            AppError::Unauthenticated(ref reason) => {
                // The reason stays in the logs; clients get the generic message.
                tracing::warn!("Authentication failed: {}", reason);
                "No autenticado".to_string()
            }

            AppError::InvalidCredentials => {
                tracing::warn!("Login rejected");
                "Credenciales inválidas o usuario inactivo".to_string()
            }

            AppError::Forbidden => {
                tracing::warn!("Authorization failed");
                FORBIDDEN_MESSAGE.to_string()
            }

            AppError::NotFound(ref msg) => {
                tracing::debug!("Resource not found: {}", msg);
                msg.clone()
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                msg.clone()
            }

            AppError::Multipart(ref msg) => {
                tracing::warn!("Multipart error: {}", msg);
                msg.clone()
            }

            AppError::Image(ref msg) => {
                tracing::warn!("Image rejected: {}", msg);
                msg.clone()
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                "Error interno del servidor".to_string()
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"error":"Error interno del servidor"}"#.to_string());

        (
            status,
            [(http::header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(
            AppError::Unauthenticated("expired".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Upstream("500".into()).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn unauthenticated_body_does_not_leak_the_reason() {
        let response = AppError::Unauthenticated("signature mismatch".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[http::header::CONTENT_TYPE],
            "application/json"
        );
    }
}
