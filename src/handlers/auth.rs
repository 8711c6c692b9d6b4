use axum::{
    extract::State,
    response::IntoResponse,
    Extension,
};
use garde::Validate;
use tower_cookies::cookie::time::Duration;
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies};

use crate::{
    error::Result,
    middleware_layer::auth::TOKEN_COOKIE,
    models::user::{SessionUser, User},
    response,
    services::auth as auth_service,
    state::AppState,
    validation::auth::{LoginRequest, RegisterRequest},
};

/// Builds the session cookie. A zero `max_age` tells the browser to drop it.
fn session_cookie(value: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(TOKEN_COOKIE, value);
    cookie.set_http_only(true);
    cookie.set_secure(secure);
    cookie.set_same_site(SameSite::Strict);
    cookie.set_path("/");
    cookie.set_max_age(max_age);
    cookie
}

fn public_profile(user: &User) -> sonic_rs::Value {
    sonic_rs::json!({
        "id": user.id.as_str(),
        "email": user.email.as_str(),
        "nombre": user.nombre.as_str(),
        "rol": user.rol.as_str(),
        "estado": user.estado.as_str(),
    })
}

/// Handles user login.
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    response::Json(payload): response::Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let user = auth_service::authenticate(&state.nocodb, &payload.email, &payload.password).await?;
    let token = state.tokens.issue(&SessionUser::from(&user))?;

    let max_age = Duration::seconds(state.tokens.lifetime().num_seconds());
    cookies.add(session_cookie(token, max_age, state.config.production));

    Ok(response::Json(sonic_rs::json!({
        "mensaje": "Login exitoso",
        "usuario": public_profile(&user),
    })))
}

/// Handles user logout. Always succeeds, signed in or not.
pub async fn logout(State(state): State<AppState>, cookies: Cookies) -> impl IntoResponse {
    cookies.add(session_cookie(
        String::new(),
        Duration::ZERO,
        state.config.production,
    ));
    tracing::debug!("👋 Session cookie cleared");
    response::Json(sonic_rs::json!({ "mensaje": "Logout exitoso" }))
}

/// Returns the signed-in user as currently stored.
pub async fn me(
    State(state): State<AppState>,
    Extension(session): Extension<SessionUser>,
) -> Result<impl IntoResponse> {
    let user = auth_service::current_user(&state.nocodb, &session).await?;
    Ok(response::Json(sonic_rs::json!({ "usuario": public_profile(&user) })))
}

/// Creates a user. Only reachable by a SuperAdmin.
pub async fn register(
    State(state): State<AppState>,
    Extension(admin): Extension<SessionUser>,
    response::Json(payload): response::Json<RegisterRequest>,
) -> Result<impl IntoResponse> {
    tracing::info!("📝 {} is registering {}", admin.email, payload.email);
    payload.validate()?;
    auth_service::register_user(&state.nocodb, payload).await?;
    Ok(response::Json(sonic_rs::json!({ "mensaje": "Usuario creado exitosamente" })))
}
