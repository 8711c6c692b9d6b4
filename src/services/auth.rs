use crate::crypto::password::{hash_password_blocking, verify_password_blocking};
use crate::error::{AppError, Result};
use crate::models::user::{SessionUser, User};
use crate::repositories::nocodb::NocoDb;
use crate::repositories::user::{self as user_repo, UserPatch};
use crate::validation::auth::{RegisterRequest, UpdateUserRequest};

/// Checks an email/password pair and returns the active user it belongs to.
///
/// Unknown email, wrong password and inactive account all fail the same way.
/// A failure to record the access time is logged and otherwise ignored.
pub async fn authenticate(db: &NocoDb, email: &str, password: &str) -> Result<User> {
    let email = email.trim();
    tracing::debug!("🔐 Login attempt for {}", email);

    let Some(found) = user_repo::find_by_email(db, email).await? else {
        tracing::warn!("❌ Login for unknown email: {}", email);
        return Err(AppError::InvalidCredentials);
    };

    let valid = verify_password_blocking(password.to_string(), found.password_hash).await?;
    if !valid {
        tracing::warn!("❌ Wrong password for user {}", found.user.id);
        return Err(AppError::InvalidCredentials);
    }

    if !found.user.estado.is_active() {
        tracing::warn!("❌ Inactive user {} tried to log in", found.user.id);
        return Err(AppError::InvalidCredentials);
    }

    match parse_user_id(&found.user.id) {
        Ok(id) => {
            if let Err(e) = user_repo::touch_last_access(db, id).await {
                tracing::warn!("⚠️ Could not record last access for {}: {}", id, e);
            }
        }
        Err(_) => tracing::warn!("⚠️ User row without numeric id: {:?}", found.user.id),
    }

    tracing::info!("✅ User {} logged in as {}", found.user.id, found.user.rol);
    Ok(found.user)
}

/// Re-reads the signed-in user so `/me` reflects the stored state.
pub async fn current_user(db: &NocoDb, session: &SessionUser) -> Result<User> {
    let id = parse_user_id(&session.id)
        .map_err(|_| AppError::Unauthenticated("token subject is not a user id".to_string()))?;

    let user = user_repo::find_by_id(db, id)
        .await?
        .ok_or_else(|| AppError::Unauthenticated(format!("user {} no longer exists", id)))?;

    if !user.estado.is_active() {
        return Err(AppError::Unauthenticated(format!("user {} is inactive", id)));
    }
    Ok(user)
}

/// Creates a user after the payload passed validation.
pub async fn register_user(db: &NocoDb, request: RegisterRequest) -> Result<()> {
    let email = request.email.trim().to_string();
    let role = request
        .role()
        .ok_or_else(|| AppError::Validation("Rol inválido".to_string()))?;

    if user_repo::find_by_email(db, &email).await?.is_some() {
        return Err(AppError::Validation(
            "Ya existe un usuario con este email".to_string(),
        ));
    }

    let hash = hash_password_blocking(request.password).await?;
    user_repo::create_user(db, &email, &hash, request.nombre.trim(), role).await?;

    tracing::info!("✅ User {} created with role {}", email, role);
    Ok(())
}

pub async fn list_users(db: &NocoDb) -> Result<Vec<User>> {
    user_repo::list_users(db).await
}

/// Applies a partial update and returns the stored result.
pub async fn update_user(db: &NocoDb, id: &str, request: UpdateUserRequest) -> Result<User> {
    let id = parse_user_id(id)?;
    let existing = user_repo::find_by_id(db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Usuario no encontrado".to_string()))?;

    let email = request.email().map(str::to_string);
    if let Some(ref email) = email {
        if !email.eq_ignore_ascii_case(&existing.email)
            && user_repo::find_by_email(db, email).await?.is_some()
        {
            return Err(AppError::Validation(
                "El email ya está en uso por otro usuario".to_string(),
            ));
        }
    }

    let password = match request.password() {
        Some(password) => Some(hash_password_blocking(password.to_string()).await?),
        None => None,
    };

    let patch = UserPatch {
        id,
        nombre: request.nombre().map(str::to_string),
        email,
        rol: request.rol().map(|r| r.as_str()),
        estado: request.estado().map(|e| e.as_str()),
        password,
        ultimo_acceso: None,
    };
    user_repo::update_user(db, &patch).await?;
    tracing::info!("✅ User {} updated", id);

    user_repo::find_by_id(db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Usuario no encontrado".to_string()))
}

fn parse_user_id(id: &str) -> Result<i64> {
    id.trim()
        .parse()
        .map_err(|_| AppError::Validation("ID de usuario inválido".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_ids_are_numeric() {
        assert_eq!(parse_user_id(" 12 ").unwrap(), 12);
        assert!(matches!(parse_user_id("abc"), Err(AppError::Validation(_))));
    }
}
