//! Error types for skillsfront
//!
//! Components classify failures as `AppError`; the `IntoResponse`
//! impl here is the single place that turns them into pages.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use thiserror::Error;

use crate::views;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Token exchange with the identity provider failed (502)
    #[error("Token exchange failed: {0}")]
    UpstreamAuth(String),

    /// Skills listing or creation failed at the resource server (502)
    #[error("Resource server error: {0}")]
    ResourceServer(String),

    /// Resource server refused the access token (redirect to login)
    #[error("Access token rejected by resource server")]
    TokenRejected,

    /// An outbound call exceeded the configured timeout (504)
    #[error("Upstream timeout during {0}")]
    Timeout(&'static str),

    /// No authenticated session (redirect to login)
    #[error("Authentication required")]
    Unauthenticated,

    /// Callback `state` missing or not the one issued for this session (400)
    #[error("Authorization state mismatch")]
    StateMismatch,

    /// Provider redirected back with an `error` parameter (400)
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    /// Bad user input (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Short label used for logs and the error counter.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::UpstreamAuth(_) => "upstream_auth",
            AppError::ResourceServer(_) => "resource_server",
            AppError::TokenRejected => "token_rejected",
            AppError::Timeout(_) => "timeout",
            AppError::Unauthenticated => "unauthenticated",
            AppError::StateMismatch => "state_mismatch",
            AppError::AuthorizationDenied(_) => "authorization_denied",
            AppError::Validation(_) => "validation",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<axum::extract::rejection::FormRejection> for AppError {
    fn from(rejection: axum::extract::rejection::FormRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Gate rejections become redirects; everything else renders the
    /// generic error page with a status matching the failure.
    fn into_response(self) -> Response {
        use crate::metrics::ERRORS_TOTAL;

        ERRORS_TOTAL.with_label_values(&[self.kind()]).inc();

        let (status, message) = match &self {
            AppError::Unauthenticated => return Redirect::to("/login").into_response(),
            AppError::TokenRejected => {
                tracing::info!("Access token rejected upstream; forcing re-login");
                return Redirect::to("/login").into_response();
            }
            AppError::UpstreamAuth(_) => (StatusCode::BAD_GATEWAY, "We could not sign you in."),
            AppError::ResourceServer(_) => (
                StatusCode::BAD_GATEWAY,
                "The skills service could not complete the request.",
            ),
            AppError::Timeout(_) => (
                StatusCode::GATEWAY_TIMEOUT,
                "An upstream service took too long to respond.",
            ),
            AppError::StateMismatch => (
                StatusCode::BAD_REQUEST,
                "The sign-in request could not be verified. Please try again.",
            ),
            AppError::AuthorizationDenied(_) => {
                (StatusCode::BAD_REQUEST, "Sign-in was cancelled or denied.")
            }
            AppError::Validation(msg) => {
                tracing::warn!(error = %self, "Rejected request");
                return (StatusCode::BAD_REQUEST, Html(views::error_page(msg))).into_response();
            }
            AppError::Config(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.")
            }
        };

        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Html(views::error_page(message))).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
