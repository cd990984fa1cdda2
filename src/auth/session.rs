//! Session management
//!
//! Sessions live server side, keyed by an opaque id that the browser
//! carries in a signed cookie. The store is a trait so the in-memory
//! map used here can be swapped for a shared backend.

use std::collections::HashMap;

use axum::async_trait;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::metrics::SESSIONS_ACTIVE;

/// Lifetime of an authenticated session cookie: one hour.
pub const SESSION_LIFETIME_MS: i64 = 3_600_000;

/// Lifetime of a session that is still waiting for its callback: five minutes.
pub const PENDING_LOGIN_LIFETIME_MS: i64 = 300_000;

/// Whether the stored access token is still usable upstream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    #[default]
    Valid,
    /// The resource server answered 401; the user must log in again
    ExpiredOrInvalid,
}

/// Per-browser session state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer credential for the resource server
    pub access_token: Option<String>,
    /// Identity assertion from the provider (kept, never inspected)
    pub id_token: Option<String>,
    /// When the session cookie expires
    pub cookie_expires_at: Option<DateTime<Utc>>,
    /// `state` nonce issued by the last `/login`, awaiting its callback
    pub pending_state: Option<String>,
    pub token_status: TokenStatus,
}

impl Session {
    /// A session is authenticated while it holds an access token that
    /// has not been rejected upstream.
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some() && self.token_status == TokenStatus::Valid
    }

    /// Check if the cookie lifetime has run out
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.cookie_expires_at
            .is_some_and(|expires_at| expires_at <= now)
    }

    /// Remember the `state` nonce sent to the provider.
    ///
    /// A session without tokens only lives [`PENDING_LOGIN_LIFETIME_MS`]
    /// past this call; sessions holding tokens keep their expiry.
    pub fn begin_authorization(&mut self, state: String, now: DateTime<Utc>) {
        self.pending_state = Some(state);
        if self.access_token.is_none() {
            self.cookie_expires_at = Some(now + Duration::milliseconds(PENDING_LOGIN_LIFETIME_MS));
        }
    }

    /// Consume the pending nonce; a nonce answers at most one callback.
    pub fn take_pending_state(&mut self) -> Option<String> {
        self.pending_state.take()
    }

    /// Store freshly exchanged tokens and start the one hour lifetime.
    ///
    /// Returns the cookie expiry, which is exactly `now + SESSION_LIFETIME_MS`.
    pub fn authenticate(
        &mut self,
        access_token: String,
        id_token: Option<String>,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let expires_at = now + Duration::milliseconds(SESSION_LIFETIME_MS);
        self.access_token = Some(access_token);
        self.id_token = id_token;
        self.token_status = TokenStatus::Valid;
        self.cookie_expires_at = Some(expires_at);
        expires_at
    }

    pub fn mark_token_rejected(&mut self) {
        self.token_status = TokenStatus::ExpiredOrInvalid;
    }
}

/// Compare a callback `state` with the issued one in constant time.
pub fn state_matches(expected: &str, received: &str) -> bool {
    type HmacSha256 = Hmac<Sha256>;

    let tag = |message: &str| {
        HmacSha256::new_from_slice(expected.as_bytes()).map(|mut mac| {
            mac.update(message.as_bytes());
            mac
        })
    };

    match (tag(expected), tag(received)) {
        (Ok(expected_mac), Ok(received_mac)) => {
            let expected_tag = expected_mac.finalize().into_bytes();
            received_mac.verify_slice(&expected_tag).is_ok()
        }
        _ => false,
    }
}

/// Session persistence
///
/// Ids are opaque strings chosen by the store.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Persist a new session and return its id.
    async fn create(&self, session: Session) -> Result<String>;

    /// Look up a live session. Expired sessions are reported as absent.
    async fn get(&self, id: &str) -> Result<Option<Session>>;

    /// Replace the state stored under `id`.
    async fn set(&self, id: &str, session: Session) -> Result<()>;

    /// Remove the session. Unknown ids are not an error.
    async fn destroy(&self, id: &str) -> Result<()>;
}

/// Process-local session store
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions currently held
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Copy of every stored session, for inspection.
    pub async fn snapshot(&self) -> Vec<(String, Session)> {
        self.sessions
            .read()
            .await
            .iter()
            .map(|(id, session)| (id.clone(), session.clone()))
            .collect()
    }
}

/// Drop every session whose cookie has run out.
///
/// Runs on each `create`.
fn purge_expired(sessions: &mut HashMap<String, Session>, now: DateTime<Utc>) {
    let before = sessions.len();
    sessions.retain(|_, session| !session.is_expired_at(now));
    let dropped = before - sessions.len();
    if dropped > 0 {
        tracing::debug!(dropped, "Purged expired sessions");
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: Session) -> Result<String> {
        let id = ulid::Ulid::new().to_string();
        let mut sessions = self.sessions.write().await;
        purge_expired(&mut sessions, Utc::now());
        sessions.insert(id.clone(), session);
        SESSIONS_ACTIVE.set(sessions.len() as i64);
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<Session>> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(id) {
                None => return Ok(None),
                Some(session) if !session.is_expired_at(now) => return Ok(Some(session.clone())),
                Some(_) => {}
            }
        }

        let mut sessions = self.sessions.write().await;
        if sessions.get(id).is_some_and(|session| session.is_expired_at(now)) {
            sessions.remove(id);
            SESSIONS_ACTIVE.set(sessions.len() as i64);
            tracing::debug!(session_id = %id, "Dropped expired session");
        }
        Ok(None)
    }

    async fn set(&self, id: &str, session: Session) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(id.to_string(), session);
        SESSIONS_ACTIVE.set(sessions.len() as i64);
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id);
        SESSIONS_ACTIVE.set(sessions.len() as i64);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticate_sets_tokens_and_exact_expiry() {
        let now = Utc::now();
        let mut session = Session::default();

        let expires_at = session.authenticate("T".to_string(), Some("I".to_string()), now);

        assert_eq!(session.access_token.as_deref(), Some("T"));
        assert_eq!(session.id_token.as_deref(), Some("I"));
        assert_eq!(
            (expires_at - now).num_milliseconds(),
            SESSION_LIFETIME_MS
        );
        assert_eq!(session.cookie_expires_at, Some(expires_at));
        assert!(session.is_authenticated());
    }

    #[test]
    fn session_without_token_is_anonymous() {
        assert!(!Session::default().is_authenticated());
    }

    #[test]
    fn rejected_token_is_not_authenticated() {
        let mut session = Session::default();
        session.authenticate("T".to_string(), None, Utc::now());
        session.mark_token_rejected();

        assert!(!session.is_authenticated());
        assert_eq!(session.access_token.as_deref(), Some("T"));
    }

    #[test]
    fn pending_state_is_single_use() {
        let mut session = Session::default();
        session.begin_authorization("abc".to_string(), Utc::now());

        assert_eq!(session.take_pending_state().as_deref(), Some("abc"));
        assert_eq!(session.take_pending_state(), None);
    }

    #[test]
    fn pending_login_expires_after_five_minutes() {
        let now = Utc::now();
        let mut session = Session::default();
        session.begin_authorization("abc".to_string(), now);

        assert_eq!(
            session.cookie_expires_at,
            Some(now + Duration::milliseconds(PENDING_LOGIN_LIFETIME_MS))
        );
        assert!(!session.is_expired_at(now + Duration::minutes(4)));
        assert!(session.is_expired_at(now + Duration::minutes(5)));
    }

    #[test]
    fn new_login_keeps_authenticated_expiry() {
        let now = Utc::now();
        let mut session = Session::default();
        let expires_at = session.authenticate("T".to_string(), None, now);
        session.mark_token_rejected();

        session.begin_authorization("abc".to_string(), now);

        assert_eq!(session.cookie_expires_at, Some(expires_at));
    }

    #[test]
    fn state_comparison() {
        assert!(state_matches("k3j9x", "k3j9x"));
        assert!(!state_matches("k3j9x", "k3j9y"));
        assert!(!state_matches("k3j9x", "k3j9"));
        assert!(!state_matches("k3j9x", ""));
    }

    #[tokio::test]
    async fn store_round_trip_and_destroy() {
        let store = MemorySessionStore::new();
        let id = store.create(Session::default()).await.unwrap();

        let mut session = store.get(&id).await.unwrap().expect("session exists");
        session.authenticate("T".to_string(), None, Utc::now());
        store.set(&id, session.clone()).await.unwrap();

        assert_eq!(store.get(&id).await.unwrap(), Some(session));

        store.destroy(&id).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap(), None);
        // destroying twice is fine
        store.destroy(&id).await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn expired_sessions_are_dropped_on_lookup() {
        let store = MemorySessionStore::new();
        let mut session = Session::default();
        session.authenticate("T".to_string(), None, Utc::now() - Duration::hours(2));
        let id = store.create(session).await.unwrap();

        assert_eq!(store.get(&id).await.unwrap(), None);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn abandoned_logins_are_purged_by_later_logins() {
        let store = MemorySessionStore::new();
        for _ in 0..50 {
            let mut session = Session::default();
            session.begin_authorization(
                "abc".to_string(),
                Utc::now() - Duration::milliseconds(PENDING_LOGIN_LIFETIME_MS + 1_000),
            );
            store.create(session).await.unwrap();
        }

        let mut fresh = Session::default();
        fresh.begin_authorization("def".to_string(), Utc::now());
        let id = store.create(fresh).await.unwrap();

        let held = store.snapshot().await;
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].0, id);
    }
}
