use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mapa360::{config::Config, routes, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");
    if config.production && config.public_app_url.is_none() {
        tracing::warn!("⚠️ PUBLIC_APP_URL is not set; image links will not be proxied");
    }

    let state = AppState::new(&config)?;

    // The service still starts when NocoDB is down; requests report 502 until it answers.
    match state.nocodb.ensure_ready().await {
        Ok(()) => tracing::info!("✅ NocoDB tables reachable"),
        Err(e) => tracing::warn!("⚠️ NocoDB not reachable at startup: {}", e),
    }

    let app = routes::router(state)?;

    let addr = config.bind_addr;
    tracing::info!("🚀 Server listening on http://{}", addr);
    tracing::info!("📁 Serving static files from {}", config.static_dir.display());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
