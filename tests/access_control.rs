use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
    middleware::from_fn_with_state,
    response::Response,
    routing::get,
    Extension, Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use tower_cookies::CookieManagerLayer;
use zeroize::Zeroizing;

use mapa360::{
    config::{Config, NocoDbConfig},
    middleware_layer::auth::{require_permission, Gate},
    models::user::{Role, SessionUser, UserStatus},
    policy::Operation,
    routes,
    state::AppState,
};

const SECRET: &str = "test-secret-test-secret-test-secret-0123";

fn config() -> Config {
    Config {
        nocodb: NocoDbConfig {
            // Nothing listens here; gated requests must be decided before any store call.
            base_url: "http://127.0.0.1:9".to_string(),
            api_token: Zeroizing::new("token".to_string()),
            sites_table_id: "sites".to_string(),
            users_table_id: "users".to_string(),
            upload_timeout: Duration::from_secs(60),
        },
        jwt_secret: Zeroizing::new(SECRET.to_string()),
        session_duration_hours: 24,
        production: false,
        public_app_url: None,
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        cors_origins: vec!["http://localhost:3000".to_string()],
        static_dir: PathBuf::from("does-not-exist"),
    }
}

fn state() -> AppState {
    AppState::new(&config()).unwrap()
}

fn app() -> Router {
    routes::router(state()).unwrap()
}

fn user(rol: Role, estado: UserStatus) -> SessionUser {
    SessionUser {
        id: "7".to_string(),
        email: "persona@example.com".to_string(),
        nombre: "Persona".to_string(),
        rol,
        estado,
    }
}

fn token_for(rol: Role) -> String {
    state().tokens.issue(&user(rol, UserStatus::Activo)).unwrap()
}

fn request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("token={}", token));
    }
    let mut req = builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));
    req
}

async fn json_body(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn missing_credential_is_401_json() {
    let response = app()
        .oneshot(request("GET", "/api/ubicaciones", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(json_body(response).await["error"], "No autenticado");
}

#[tokio::test]
async fn viewer_cannot_edit_sites() {
    let token = token_for(Role::Viewer);
    let response = app()
        .oneshot(request("PUT", "/api/ubicaciones/1", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        json_body(response).await["error"],
        "No tienes permisos para acceder a este recurso"
    );
}

#[tokio::test]
async fn add_role_cannot_list_sites() {
    let token = token_for(Role::Add);
    let response = app()
        .oneshot(request("GET", "/api/ubicaciones", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn only_superadmin_registers_users() {
    for rol in [Role::Admin, Role::Editor, Role::Viewer, Role::Add] {
        let token = token_for(rol);
        let response = app()
            .oneshot(request("POST", "/api/auth/register", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "role {}", rol);
    }
}

#[tokio::test]
async fn expired_token_is_401_before_the_role_check() {
    let state = state();
    let token = state
        .tokens
        .issue_at(
            &user(Role::Viewer, UserStatus::Activo),
            chrono::Utc::now() - chrono::Duration::hours(25),
        )
        .unwrap();

    let response = app()
        .oneshot(request("GET", "/api/usuarios", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_bearer_token_is_401() {
    let mut req = request("GET", "/api/ubicaciones", None);
    req.headers_mut()
        .insert(header::AUTHORIZATION, "Bearer not.a.jwt".parse().unwrap());

    let response = app().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn inactive_account_is_401() {
    let token = state()
        .tokens
        .issue(&user(Role::SuperAdmin, UserStatus::Inactivo))
        .unwrap();

    let response = app()
        .oneshot(request("GET", "/api/ubicaciones", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn editor_payloads_are_validated_before_reaching_the_store() {
    let token = token_for(Role::Editor);

    let response = app()
        .oneshot(request("PUT", "/api/ubicaciones/abc", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "ID de ubicación inválido");

    let mut req = request("PUT", "/api/ubicaciones/3", Some(&token));
    *req.body_mut() = Body::from(r#"{"vigencia":0}"#);
    let response = app().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["error"],
        "La vigencia debe ser al menos 1 día"
    );
}

#[tokio::test]
async fn malformed_json_bodies_are_400_json() {
    let token = token_for(Role::Editor);

    let mut req = request("PUT", "/api/ubicaciones/3", Some(&token));
    *req.body_mut() = Body::from(r#"{"nombre": 5}"#);
    let response = app().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(json_body(response).await["error"], "Cuerpo JSON inválido");

    let mut req = request("POST", "/api/auth/login", None);
    *req.body_mut() = Body::from("email=a@b.com");
    req.headers_mut()
        .insert(header::CONTENT_TYPE, "application/x-www-form-urlencoded".parse().unwrap());
    let response = app().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Se esperaba un cuerpo JSON");
}

#[tokio::test]
async fn oversized_vigencia_is_refused_before_reaching_the_store() {
    let token = token_for(Role::Editor);
    let mut req = request("PUT", "/api/ubicaciones/3", Some(&token));
    *req.body_mut() = Body::from(r#"{"vigencia":200000000000000}"#);

    let response = app().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["error"],
        "La vigencia no puede superar 36500 días"
    );
}

#[tokio::test]
async fn proxy_refuses_foreign_urls() {
    let token = token_for(Role::Viewer);
    let response = app()
        .oneshot(request(
            "GET",
            "/api/proxy-image?url=https%3A%2F%2Fevil.example.com%2Fa.jpg",
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "URL de imagen no válida");
}

#[tokio::test]
async fn logout_expires_the_cookie() {
    let response = app()
        .oneshot(request("POST", "/api/auth/logout", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("Max-Age=0"));
    assert!(cookie.contains("HttpOnly"));
    assert_eq!(json_body(response).await["mensaje"], "Logout exitoso");
}

#[tokio::test]
async fn login_without_fields_is_400() {
    let response = app()
        .oneshot(request("POST", "/api/auth/login", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["error"],
        "Email y contraseña son requeridos"
    );
}

#[tokio::test]
async fn login_is_throttled_per_ip() {
    let app = app();
    for _ in 0..mapa360::middleware_layer::rate_limit::LOGIN_BURST {
        let response = app
            .clone()
            .oneshot(request("POST", "/api/auth/login", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = app
        .oneshot(request("POST", "/api/auth/login", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
}

#[tokio::test]
async fn gate_hands_the_identity_to_the_handler() {
    let state = state();
    let app = Router::new()
        .route(
            "/whoami",
            get(|Extension(user): Extension<SessionUser>| async move { user.email }),
        )
        .route_layer(from_fn_with_state(
            Gate::new(&state, Operation::CreateSite),
            require_permission,
        ))
        .layer(CookieManagerLayer::new());

    let token = token_for(Role::Add);
    let response = app
        .clone()
        .oneshot(request("GET", "/whoami", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"persona@example.com");

    // The cookie wins over a bearer header carrying a weaker role.
    let mut req = request("GET", "/whoami", Some(&token));
    let viewer = token_for(Role::Viewer);
    req.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {}", viewer).parse().unwrap(),
    );
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
