use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension,
};
use garde::Validate;

use crate::{
    error::Result,
    models::user::SessionUser,
    response,
    services::auth as auth_service,
    state::AppState,
    validation::auth::UpdateUserRequest,
};

/// Lists every user, without password hashes.
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let users = auth_service::list_users(&state.nocodb).await?;
    Ok(response::Json(users))
}

/// Applies a partial update to a user.
pub async fn update_user(
    State(state): State<AppState>,
    Extension(admin): Extension<SessionUser>,
    Path(id): Path<String>,
    response::Json(payload): response::Json<UpdateUserRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    tracing::info!("👤 {} is updating user {}", admin.email, id);
    let user = auth_service::update_user(&state.nocodb, &id, payload).await?;

    Ok(response::Json(sonic_rs::json!({
        "message": "Usuario actualizado exitosamente",
        "usuario": user,
    })))
}
