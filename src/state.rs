use std::sync::Arc;

use crate::config::Config;
use crate::crypto::token::TokenManager;
use crate::error::Result;
use crate::repositories::nocodb::NocoDb;

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Arc<Config>,
    /// The NocoDB REST client.
    pub nocodb: NocoDb,
    /// Session token issuer and verifier.
    pub tokens: TokenManager,
}

impl AppState {
    /// Creates a new `AppState`.
    ///
    /// Nothing is contacted here; NocoDB is first reached by
    /// [`NocoDb::ensure_ready`] or the first request.
    pub fn new(config: &Config) -> Result<Self> {
        let nocodb = NocoDb::new(config.nocodb.clone())?;
        tracing::info!("✅ NocoDB client initialized for {}", nocodb.base_url());

        let tokens = TokenManager::new(
            config.jwt_secret.as_bytes(),
            chrono::Duration::hours(config.session_duration_hours),
        );
        tracing::info!(
            "✅ Token manager initialized ({}h sessions)",
            config.session_duration_hours
        );

        Ok(AppState {
            config: Arc::new(config.clone()),
            nocodb,
            tokens,
        })
    }
}
