use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Router,
};
use tower_cookies::CookieManagerLayer;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    error::{AppError, Result},
    handlers,
    middleware_layer::{
        auth::{require_permission, Gate},
        rate_limit,
    },
    policy::Operation,
    state::AppState,
};

/// Largest accepted request body; 360° photos are big.
pub const MAX_BODY_BYTES: usize = 100 * 1024 * 1024;

/// Routes of one operation, wrapped in the gate for that operation.
fn gated(state: &AppState, operation: Operation, routes: Router<AppState>) -> Router {
    routes
        .route_layer(from_fn_with_state(
            Gate::new(state, operation),
            require_permission,
        ))
        .with_state(state.clone())
}

fn cors(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("⚠️ Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::COOKIE,
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(86400))
}

/// Builds the application router.
pub fn router(state: AppState) -> Result<Router> {
    let login_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(rate_limit::LOGIN_REPLENISH_SECS)
            .burst_size(rate_limit::LOGIN_BURST)
            .use_headers()
            .finish()
            .ok_or_else(|| AppError::Internal("Invalid login rate limit".to_string()))?,
    );

    let login_routes = Router::new()
        .route("/api/auth/login", post(handlers::auth::login))
        .layer(GovernorLayer::new(login_governor_conf))
        .layer(from_fn(rate_limit::json_too_many_requests))
        .with_state(state.clone());

    let public_routes = Router::new()
        .route("/api/auth/logout", post(handlers::auth::logout))
        .with_state(state.clone());

    let session_routes = gated(
        &state,
        Operation::ViewSession,
        Router::new().route("/api/auth/me", get(handlers::auth::me)),
    );

    let read_routes = gated(
        &state,
        Operation::ReadSites,
        Router::new()
            .route("/api/ubicaciones", get(handlers::sites::list_sites))
            .route("/api/proxy-image", get(handlers::images::proxy_image)),
    );

    let create_routes = gated(
        &state,
        Operation::CreateSite,
        Router::new().route("/api/ubicaciones/agregar", post(handlers::sites::create_site)),
    );

    let edit_routes = gated(
        &state,
        Operation::EditSite,
        Router::new()
            .route("/api/ubicaciones/{id}", put(handlers::sites::update_site))
            .route(
                "/api/ubicaciones/upload-images",
                post(handlers::sites::upload_images),
            ),
    );

    let delete_routes = gated(
        &state,
        Operation::DeleteSite,
        Router::new().route(
            "/api/ubicaciones/{id}/eliminar",
            delete(handlers::sites::delete_site),
        ),
    );

    let user_routes = gated(
        &state,
        Operation::ManageUsers,
        Router::new()
            .route("/api/auth/register", post(handlers::auth::register))
            .route("/api/usuarios", get(handlers::users::list_users))
            .route("/api/usuarios/{id}", put(handlers::users::update_user)),
    );

    let app = Router::new()
        .merge(login_routes)
        .merge(public_routes)
        .merge(session_routes)
        .merge(read_routes)
        .merge(create_routes)
        .merge(edit_routes)
        .merge(delete_routes)
        .merge(user_routes)
        .fallback_service(ServeDir::new(&state.config.static_dir))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
        .layer(CompressionLayer::new())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors(&state.config.cors_origins));

    Ok(app)
}
