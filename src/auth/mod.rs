//! OAuth2 authentication
//!
//! Handles:
//! - Authorization code flow against the configured issuer
//! - Session management
//! - Authentication middleware

pub mod client;
mod cookies;
mod middleware;
mod oauth;
pub mod session;

pub use client::{AuthorizationRequest, OAuthClient, TokenResponse};
pub use middleware::{CurrentSession, MaybeSession, load_session, require_auth};
pub use oauth::auth_router;
pub use session::{MemorySessionStore, Session, SessionStore, TokenStatus};
