use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use zeroize::Zeroizing;

/// Minimum accepted length of the token signing secret, in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Connection settings for the NocoDB instance.
#[derive(Clone)]
pub struct NocoDbConfig {
    /// Base URL of the NocoDB instance, without trailing slash.
    pub base_url: String,
    /// API token sent as `xc-token`.
    pub api_token: Zeroizing<String>,
    /// Table holding the tracked sites.
    pub sites_table_id: String,
    /// Table holding dashboard users.
    pub users_table_id: String,
    /// Timeout applied to attachment uploads.
    pub upload_timeout: Duration,
}

impl NocoDbConfig {
    /// Reads the NocoDB settings from environment variables.
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("NOCODB_BASE_URL")
            .context("NOCODB_BASE_URL must be set")?
            .trim_end_matches('/')
            .to_string();

        let upload_timeout_secs: u64 = env::var("UPLOAD_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .context("Invalid UPLOAD_TIMEOUT_SECS")?;

        Ok(Self {
            base_url,
            api_token: Zeroizing::new(
                env::var("NOCODB_API_TOKEN").context("NOCODB_API_TOKEN must be set")?,
            ),
            sites_table_id: env::var("NOCODB_TABLE_ID").context("NOCODB_TABLE_ID must be set")?,
            users_table_id: env::var("NOCODB_USUARIOS_TABLE_ID")
                .context("NOCODB_USUARIOS_TABLE_ID must be set")?,
            upload_timeout: Duration::from_secs(upload_timeout_secs),
        })
    }
}

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// NocoDB connection settings.
    pub nocodb: NocoDbConfig,
    /// HMAC secret used to sign session tokens.
    pub jwt_secret: Zeroizing<String>,
    /// Lifetime of a session token in hours.
    pub session_duration_hours: i64,
    /// Whether the service runs in production (secure cookies, image proxy).
    pub production: bool,
    /// Public URL of this service, used to build image proxy links.
    pub public_app_url: Option<String>,
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Origins allowed by CORS.
    pub cors_origins: Vec<String>,
    /// Directory served for any route the API does not handle.
    pub static_dir: PathBuf,
}

impl Config {
    /// Base URL for image proxy links, set only in production.
    pub fn image_proxy_base(&self) -> Option<&str> {
        if self.production {
            self.public_app_url.as_deref()
        } else {
            None
        }
    }

    /// Creates a new `Config` from environment variables.
    pub fn from_env() -> Result<Self> {
        let jwt_secret = Zeroizing::new(
            env::var("JWT_SECRET")
                .context("JWT_SECRET must be set (generate with: openssl rand -hex 32)")?,
        );

        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least {} bytes", MIN_JWT_SECRET_LEN);
        }

        let nocodb = NocoDbConfig::from_env()?;

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|value| {
                value
                    .split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://127.0.0.1:3000".to_string(),
                    "http://[::1]:3000".to_string(),
                ]
            });

        Ok(Self {
            nocodb,
            jwt_secret,
            session_duration_hours: env::var("SESSION_DURATION_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .context("Invalid SESSION_DURATION_HOURS")?,
            production: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string())
                == "production",
            public_app_url: env::var("PUBLIC_APP_URL")
                .ok()
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
                .parse()
                .context("Invalid BIND_ADDR")?,
            cors_origins,
            static_dir: env::var("STATIC_DIR")
                .unwrap_or_else(|_| "public".to_string())
                .into(),
        })
    }
}
