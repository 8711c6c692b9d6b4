//! Seeds the first SuperAdmin account.
//!
//! Reads `SUPERADMIN_EMAIL`, `SUPERADMIN_PASSWORD` and optionally
//! `SUPERADMIN_NOMBRE`, plus the usual NocoDB variables. Does nothing if the
//! email is already registered.

use anyhow::{bail, Context};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mapa360::{
    config::NocoDbConfig,
    crypto::password::hash_password_blocking,
    models::user::Role,
    repositories::{nocodb::NocoDb, user as user_repo},
    validation::auth::{is_valid_email, MIN_PASSWORD_LEN},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let email = std::env::var("SUPERADMIN_EMAIL").context("SUPERADMIN_EMAIL must be set")?;
    let password =
        std::env::var("SUPERADMIN_PASSWORD").context("SUPERADMIN_PASSWORD must be set")?;
    let nombre = std::env::var("SUPERADMIN_NOMBRE").unwrap_or_else(|_| "Super Administrador".into());

    if !is_valid_email(&email) {
        bail!("SUPERADMIN_EMAIL is not a valid email: {}", email);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        bail!("SUPERADMIN_PASSWORD must have at least {} characters", MIN_PASSWORD_LEN);
    }

    let db = NocoDb::new(NocoDbConfig::from_env()?)?;

    if user_repo::find_by_email(&db, &email).await?.is_some() {
        tracing::info!("ℹ️ {} already exists, nothing to do", email);
        return Ok(());
    }

    let hash = hash_password_blocking(password).await?;
    user_repo::create_user(&db, &email, &hash, &nombre, Role::SuperAdmin).await?;
    tracing::info!("✅ SuperAdmin {} created", email);

    Ok(())
}
