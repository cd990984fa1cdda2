//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub oauth_client: OAuthClientConfig,
    pub resource_server: ResourceServerConfig,
    pub session: SessionConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public root URL the browser reaches us on (e.g., "http://localhost:8080")
    pub root: String,
}

impl ServerConfig {
    /// Public root without a trailing slash
    pub fn base_url(&self) -> &str {
        self.root.trim_end_matches('/')
    }
}

/// OAuth2 client registration at the identity provider
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthClientConfig {
    pub id: String,
    pub secret: String,
    /// Issuer base URL; `/v1/authorize` and `/v1/token` are resolved against it
    pub issuer_url: String,
}

/// Skills resource server
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceServerConfig {
    pub url: String,
}

/// Session cookie configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Cookie signing secret (32+ bytes)
    pub secret: String,
    /// Name of the session id cookie (default: "sid")
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

fn default_cookie_name() -> String {
    "sid".to_string()
}

/// Outbound HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Timeout applied to every provider and resource server call
    pub timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_seconds: 10 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (SKILLSFRONT__SECTION__KEY)
    ///
    /// Values are checked by [`AppConfig::validate`] when the application
    /// state is built.
    ///
    /// # Errors
    /// Returns error if configuration is missing or malformed
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.root", "http://localhost:8080")?
            .set_default("session.cookie_name", "sid")?
            .set_default("http.timeout_seconds", 10)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("SKILLSFRONT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))
    }

    /// Whether the session cookie must carry the `Secure` attribute
    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.root.starts_with("https://")
    }

    /// Reject configuration the server cannot run with.
    pub fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.session.secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "session.secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.session.cookie_name.trim().is_empty() {
            return Err(crate::error::AppError::Config(
                "session.cookie_name must not be empty".to_string(),
            ));
        }

        if self.http.timeout_seconds == 0 {
            return Err(crate::error::AppError::Config(
                "http.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.oauth_client.id.is_empty() || self.oauth_client.secret.is_empty() {
            return Err(crate::error::AppError::Config(
                "oauth_client.id and oauth_client.secret are required".to_string(),
            ));
        }

        for (key, value) in [
            ("server.root", &self.server.root),
            ("oauth_client.issuer_url", &self.oauth_client.issuer_url),
            ("resource_server.url", &self.resource_server.url),
        ] {
            let parsed = url::Url::parse(value).map_err(|e| {
                crate::error::AppError::Config(format!("{key} is not a valid URL: {e}"))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(crate::error::AppError::Config(format!(
                    "{key} must use http or https"
                )));
            }
        }

        if !self.should_use_secure_cookies() {
            tracing::warn!(
                root = %self.server.root,
                "Using insecure session cookies; serve over https in production"
            );
        }

        Ok(())
    }
}
