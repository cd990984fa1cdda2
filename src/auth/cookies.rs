use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Utc};
use time::{Duration, OffsetDateTime};

use super::session::{PENDING_LOGIN_LIFETIME_MS, SESSION_LIFETIME_MS};
use crate::error::AppError;

/// Session cookie for a browser that is still logging in.
///
/// Lives as long as the pending session on the server.
pub(crate) fn pending_session_cookie(name: &str, session_id: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((name.to_string(), session_id.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::milliseconds(PENDING_LOGIN_LIFETIME_MS))
        .build()
}

/// Session cookie after a successful login.
///
/// `Max-Age` and `Expires` both describe the same instant.
pub(crate) fn authenticated_session_cookie(
    name: &str,
    session_id: &str,
    expires_at: DateTime<Utc>,
    secure: bool,
) -> Result<Cookie<'static>, AppError> {
    let expires = OffsetDateTime::from_unix_timestamp_nanos(
        i128::from(expires_at.timestamp_millis()) * 1_000_000,
    )
    .map_err(|e| AppError::Internal(e.into()))?;

    Ok(Cookie::build((name.to_string(), session_id.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::milliseconds(SESSION_LIFETIME_MS))
        .expires(expires)
        .build())
}

/// Removal cookie for the session.
pub(crate) fn clear_session_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), ""))
        .path("/")
        .max_age(Duration::ZERO)
        .build()
}
