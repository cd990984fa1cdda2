//! OAuth2 authorization code client
//!
//! Builds the provider redirect and exchanges the returned code for
//! tokens. Refresh is not implemented; sessions end with their cookie.

use std::time::Instant;

use serde::Deserialize;

use crate::config::{OAuthClientConfig, ServerConfig};
use crate::error::{AppError, Result};
use crate::metrics::{UPSTREAM_REQUEST_DURATION_SECONDS, record_upstream};

/// Path the provider redirects back to
pub const CALLBACK_PATH: &str = "/authorization-code/callback";

/// Scopes requested on every login
pub const SCOPES: &str = "openid profile read_skills write_skills";

/// Provider redirect plus the nonce the caller must keep for the callback
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

/// Token response from the provider token endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// OAuth2 client for the configured issuer
#[derive(Debug, Clone)]
pub struct OAuthClient {
    client_id: String,
    client_secret: String,
    authorize_url: String,
    token_url: String,
    redirect_uri: String,
    http: reqwest::Client,
}

impl OAuthClient {
    pub fn new(
        config: &OAuthClientConfig,
        server: &ServerConfig,
        http: reqwest::Client,
    ) -> Self {
        let issuer = config.issuer_url.trim_end_matches('/');
        Self {
            client_id: config.id.clone(),
            client_secret: config.secret.clone(),
            authorize_url: format!("{issuer}/v1/authorize"),
            token_url: format!("{issuer}/v1/token"),
            redirect_uri: format!("{}{CALLBACK_PATH}", server.base_url()),
            http,
        }
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Build the provider authorization URL with a fresh `state` nonce.
    ///
    /// Values are percent-encoded individually so spaces in `scope`
    /// travel as `%20`.
    pub fn authorization_url(&self) -> AuthorizationRequest {
        let state = generate_state();
        let query = [
            ("client_id", self.client_id.as_str()),
            ("response_type", "code"),
            ("scope", SCOPES),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("state", state.as_str()),
        ]
        .iter()
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");

        AuthorizationRequest {
            url: format!("{}?{query}", self.authorize_url),
            state,
        }
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Timeout`] if the provider does not answer in
    /// time and [`AppError::UpstreamAuth`] on any other failure.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        let params = [
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code", code),
        ];

        let started = Instant::now();
        let result = self.request_tokens(&params).await;
        UPSTREAM_REQUEST_DURATION_SECONDS
            .with_label_values(&["token"])
            .observe(started.elapsed().as_secs_f64());
        record_upstream("token", if result.is_ok() { "success" } else { "failure" });
        result
    }

    async fn request_tokens(&self, params: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(params)
            .send()
            .await
            .map_err(send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamAuth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        response.json::<TokenResponse>().await.map_err(send_error)
    }
}

fn send_error(err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Timeout("token exchange")
    } else {
        AppError::UpstreamAuth(err.to_string())
    }
}

/// Random `state` nonce, base-36 encoded.
pub fn generate_state() -> String {
    to_base36(rand::random::<u128>())
}

fn to_base36(mut value: u128) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if value == 0 {
        return "0".to_string();
    }

    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
