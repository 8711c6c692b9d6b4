use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::session::Claims;
use crate::models::user::SessionUser;

/// Issues and verifies HS256 session tokens.
#[derive(Clone)]
pub struct TokenManager {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    validation: Arc<Validation>,
    lifetime: Duration,
}

impl TokenManager {
    /// Creates a manager signing with `secret`, issuing tokens valid for `lifetime`.
    pub fn new(secret: &[u8], lifetime: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: Arc::new(EncodingKey::from_secret(secret)),
            decoding_key: Arc::new(DecodingKey::from_secret(secret)),
            validation: Arc::new(validation),
            lifetime,
        }
    }

    /// Lifetime of issued tokens.
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issues a token for `user`, valid from now.
    pub fn issue(&self, user: &SessionUser) -> Result<String> {
        self.issue_at(user, Utc::now())
    }

    /// Issues a token for `user` as if it had been signed at `issued_at`.
    pub fn issue_at(&self, user: &SessionUser, issued_at: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            nombre: user.nombre.clone(),
            rol: user.rol,
            estado: user.estado,
            iat: issued_at.timestamp(),
            exp: (issued_at + self.lifetime).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Verifies signature and expiry and returns the embedded claims.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let reason = match e.kind() {
                    ErrorKind::ExpiredSignature => "token expired".to_string(),
                    ErrorKind::InvalidSignature => "invalid token signature".to_string(),
                    ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) => {
                        "malformed token".to_string()
                    }
                    _ => format!("token rejected: {}", e),
                };
                AppError::Unauthenticated(reason)
            })
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("algorithm", &"HS256")
            .field("lifetime", &self.lifetime)
            .finish()
    }
}
