//! OAuth2 authorization code flow
//!
//! Implements login, callback and logout against the configured issuer.

use axum::{
    Router,
    extract::{Query, State},
    response::Redirect,
    routing::get,
};
use axum_extra::extract::SignedCookieJar;
use chrono::Utc;
use serde::Deserialize;

use super::client::CALLBACK_PATH;
use super::cookies;
use super::middleware::load_session;
use super::session::{Session, state_matches};
use crate::AppState;
use crate::error::{AppError, Result};
use crate::metrics::LOGINS_TOTAL;

/// Create authentication router
///
/// Routes:
/// - GET /login - Redirect to the provider
/// - GET /authorization-code/callback - OAuth callback
/// - GET /logout - Logout
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login))
        .route(CALLBACK_PATH, get(callback))
        .route("/logout", get(logout))
}

// =============================================================================
// Login
// =============================================================================

/// GET /login
///
/// Redirects the browser to the provider authorization endpoint.
///
/// # Steps
/// 1. Generate the `state` nonce and authorization URL
/// 2. Store the nonce in the browser's session, creating one if needed
/// 3. Redirect to the provider
async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> Result<(SignedCookieJar, Redirect)> {
    let request = state.oauth.authorization_url();
    let now = Utc::now();

    let jar = match load_session(&state, &jar).await? {
        Some(mut current) => {
            current.session.begin_authorization(request.state, now);
            state.sessions.set(&current.id, current.session).await?;
            jar
        }
        None => {
            let mut session = Session::default();
            session.begin_authorization(request.state, now);
            let session_id = state.sessions.create(session).await?;
            tracing::debug!(session_id = %session_id, "Created session for login");
            jar.add(cookies::pending_session_cookie(
                &state.config.session.cookie_name,
                &session_id,
                state.config.should_use_secure_cookies(),
            ))
        }
    };

    Ok((jar, Redirect::to(&request.url)))
}

// =============================================================================
// Callback
// =============================================================================

/// Query parameters from the provider callback
#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// GET /authorization-code/callback
///
/// # Steps
/// 1. Surface provider-side errors
/// 2. Verify the returned `state` against the one stored at login
/// 3. Exchange the code for tokens
/// 4. Store tokens under a new session id, start the one hour cookie lifetime
/// 5. Redirect to /skills
async fn callback(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(SignedCookieJar, Redirect)> {
    let result = complete_login(&state, jar, params).await;
    let outcome = match &result {
        Ok(_) => "success",
        Err(error) => error.kind(),
    };
    LOGINS_TOTAL.with_label_values(&[outcome]).inc();
    result
}

async fn complete_login(
    state: &AppState,
    jar: SignedCookieJar,
    params: CallbackParams,
) -> Result<(SignedCookieJar, Redirect)> {
    if let Some(error) = params.error {
        let description = params.error_description.unwrap_or_default();
        tracing::warn!(%error, %description, "Provider returned an authorization error");
        return Err(AppError::AuthorizationDenied(error));
    }

    let mut pending = load_session(state, &jar)
        .await?
        .ok_or(AppError::StateMismatch)?;

    // The nonce is spent whether or not it matches.
    let expected = pending.session.take_pending_state();
    if expected.is_some() {
        state
            .sessions
            .set(&pending.id, pending.session.clone())
            .await?;
    }

    match (expected, params.state.as_deref()) {
        (Some(expected), Some(received)) if state_matches(&expected, received) => {}
        _ => {
            tracing::warn!(session_id = %pending.id, "OAuth state mismatch");
            return Err(AppError::StateMismatch);
        }
    }

    let code = params
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::Validation("Missing authorization code.".to_string()))?;

    let tokens = state.oauth.exchange_code(&code).await?;

    // The pre-login id never carries tokens.
    let mut session = Session::default();
    let expires_at = session.authenticate(tokens.access_token, tokens.id_token, Utc::now());
    let session_id = state.sessions.create(session).await?;
    state.sessions.destroy(&pending.id).await?;

    let cookie = cookies::authenticated_session_cookie(
        &state.config.session.cookie_name,
        &session_id,
        expires_at,
        state.config.should_use_secure_cookies(),
    )?;

    tracing::info!(
        session_id = %session_id,
        previous_session_id = %pending.id,
        %expires_at,
        "OAuth2 login successful"
    );

    Ok((jar.add(cookie), Redirect::to("/skills")))
}

// =============================================================================
// Logout
// =============================================================================

/// GET /logout
///
/// Destroys the session, clears the cookie and redirects home.
/// Calling it without a session is a no-op redirect.
async fn logout(State(state): State<AppState>, jar: SignedCookieJar) -> (SignedCookieJar, Redirect) {
    let cookie_name = &state.config.session.cookie_name;

    if let Some(cookie) = jar.get(cookie_name) {
        match state.sessions.destroy(cookie.value()).await {
            Ok(()) => tracing::info!(session_id = %cookie.value(), "Session destroyed"),
            Err(error) => tracing::warn!(%error, "Session deletion failed during logout"),
        }
    }

    (
        jar.remove(cookies::clear_session_cookie(cookie_name)),
        Redirect::to("/"),
    )
}
