//! skillsfront - a server-rendered skills front-end
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Route layer (Axum)                        │
//! │  - /login, /authorization-code/callback, /logout            │
//! │  - /, /skills, /add-skills                                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Authorization gate                         │
//! │  - session cookie → session store → admit or redirect       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Upstreams                               │
//! │  - Identity provider (authorize / token)                    │
//! │  - Skills resource server (bearer token)                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: home, skills and metrics handlers
//! - `auth`: OAuth2 client, sessions, authorization gate
//! - `resource`: resource server client
//! - `views`: HTML pages
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod resource;
pub mod views;

use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};

/// Application state shared across all handlers
///
/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Identity provider client
    pub oauth: Arc<auth::OAuthClient>,

    /// Skills resource server client
    pub resources: Arc<resource::ResourceClient>,

    /// Session persistence
    pub sessions: Arc<dyn auth::SessionStore>,

    /// Key signing the session cookie
    cookie_key: Key,
}

impl AppState {
    /// Initialize application state with an in-memory session store
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or the HTTP client
    /// cannot be built
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        Self::with_session_store(config, Arc::new(auth::MemorySessionStore::new()))
    }

    /// Initialize application state with a caller-provided session store
    ///
    /// This is the one place configuration is validated.
    pub fn with_session_store(
        config: config::AppConfig,
        sessions: Arc<dyn auth::SessionStore>,
    ) -> Result<Self, error::AppError> {
        config.validate()?;

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("skillsfront/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(config.http.timeout_seconds))
            .build()
            .map_err(|e| error::AppError::Internal(e.into()))?;

        let oauth = auth::OAuthClient::new(&config.oauth_client, &config.server, http_client.clone());
        let resources = resource::ResourceClient::new(&config.resource_server.url, http_client);
        let cookie_key = derive_cookie_key(&config.session.secret);

        tracing::info!(
            redirect_uri = %oauth.redirect_uri(),
            resource_server = %resources.endpoint(),
            "Application state initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            oauth: Arc::new(oauth),
            resources: Arc::new(resources),
            sessions,
            cookie_key,
        })
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Stretch the configured secret to the 64 bytes a cookie key needs.
fn derive_cookie_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::home_router())
        .merge(auth::auth_router())
        .merge(api::skills_router(state.clone()))
        .merge(api::metrics_router::<AppState>())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
