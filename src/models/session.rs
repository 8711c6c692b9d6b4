use serde::{Deserialize, Serialize};

use crate::models::user::{Role, SessionUser, UserStatus};

/// Claims carried by a signed session token.
///
/// The identity travels inside the token, so verifying a request never needs
/// a store lookup. A role or status change takes effect at the next login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub nombre: String,
    pub rol: Role,
    pub estado: UserStatus,
    /// Issued-at (Unix timestamp, seconds).
    pub iat: i64,
    /// Expiry (Unix timestamp, seconds).
    pub exp: i64,
    /// Token id, only used to correlate log lines.
    pub jti: String,
}

impl Claims {
    pub fn session_user(&self) -> SessionUser {
        SessionUser {
            id: self.sub.clone(),
            email: self.email.clone(),
            nombre: self.nombre.clone(),
            rol: self.rol,
            estado: self.estado,
        }
    }
}
