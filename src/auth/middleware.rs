//! Authentication middleware
//!
//! Protects routes that require a logged-in session.

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{Request, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::SignedCookieJar;

use super::session::Session;
use crate::AppState;
use crate::error::{AppError, Result};

/// Session attached to the current request
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub id: String,
    pub session: Session,
}

impl CurrentSession {
    pub fn access_token(&self) -> Result<&str> {
        self.session
            .access_token
            .as_deref()
            .ok_or(AppError::Unauthenticated)
    }
}

/// Resolve the session named by the request's signed cookie.
///
/// Returns `None` when the cookie is missing, tampered with, or names a
/// session the store no longer has.
pub async fn load_session(state: &AppState, jar: &SignedCookieJar) -> Result<Option<CurrentSession>> {
    let Some(cookie) = jar.get(&state.config.session.cookie_name) else {
        return Ok(None);
    };

    let id = cookie.value().to_string();
    Ok(state
        .sessions
        .get(&id)
        .await?
        .map(|session| CurrentSession { id, session }))
}

/// Middleware to require authentication
///
/// Requests without an authenticated session are redirected to `/login`
/// and never reach the handler. Otherwise the session is added to the
/// request extensions for [`CurrentSession`].
///
/// # Usage
/// ```ignore
/// let protected_routes = Router::new()
///     .route("/skills", ...)
///     .route_layer(middleware::from_fn_with_state(state, require_auth));
/// ```
pub async fn require_auth(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response> {
    let current = load_session(&state, &jar)
        .await?
        .filter(|current| current.session.is_authenticated())
        .ok_or(AppError::Unauthenticated)?;

    tracing::debug!(session_id = %current.id, "Session admitted");
    request.extensions_mut().insert(current);

    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    /// Only available behind [`require_auth`].
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .ok_or(AppError::Unauthenticated)
    }
}

/// Optional session extractor
///
/// Never rejects; store failures are logged and treated as anonymous.
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<CurrentSession>);

impl MaybeSession {
    pub fn is_authenticated(&self) -> bool {
        self.0
            .as_ref()
            .is_some_and(|current| current.session.is_authenticated())
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeSession {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        if let Some(current) = parts.extensions.get::<CurrentSession>().cloned() {
            return Ok(MaybeSession(Some(current)));
        }

        let jar: SignedCookieJar = SignedCookieJar::from_request_parts(parts, state).await?;
        match load_session(state, &jar).await {
            Ok(current) => Ok(MaybeSession(current)),
            Err(error) => {
                tracing::warn!(%error, "Session lookup failed; treating request as anonymous");
                Ok(MaybeSession(None))
            }
        }
    }
}
