//! Common test utilities for E2E tests
//!
//! Every `TestServer` runs the real router against two in-process fakes:
//! an identity provider and a skills resource server.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    Form, Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::TypedHeader;
use axum_extra::headers::{
    Authorization,
    authorization::{Basic, Bearer},
};
use reqwest::header::{LOCATION, SET_COOKIE};
use skillsfront::auth::{MemorySessionStore, Session};
use skillsfront::resource::SkillsPayload;
use skillsfront::{AppState, config};
use tokio::net::TcpListener;

pub const CLIENT_ID: &str = "test-client-id";
pub const CLIENT_SECRET: &str = "test-client-secret";
pub const COOKIE_NAME: &str = "sid";

/// Requests observed by the fake upstreams
#[derive(Clone, Default)]
pub struct FakeUpstreams {
    pub token_requests: Arc<Mutex<Vec<HashMap<String, String>>>>,
    pub skills: Arc<Mutex<Vec<String>>>,
    pub posted: Arc<Mutex<Vec<Vec<String>>>>,
    pub resource_calls: Arc<Mutex<usize>>,
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub issuer_url: String,
    pub state: AppState,
    pub sessions: Arc<MemorySessionStore>,
    pub upstream: FakeUpstreams,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        let upstream = FakeUpstreams::default();

        let provider_addr = spawn(provider_router(upstream.clone())).await;
        let resource_addr = spawn(resource_router(upstream.clone())).await;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());
        let issuer_url = format!("{provider_addr}/oauth2/default");

        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                root: addr.clone(),
            },
            oauth_client: config::OAuthClientConfig {
                id: CLIENT_ID.to_string(),
                secret: CLIENT_SECRET.to_string(),
                issuer_url: issuer_url.clone(),
            },
            resource_server: config::ResourceServerConfig {
                url: resource_addr,
            },
            session: config::SessionConfig {
                secret: "test-session-secret-at-least-32-bytes".to_string(),
                cookie_name: COOKIE_NAME.to_string(),
            },
            http: config::HttpConfig { timeout_seconds: 1 },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        let sessions = Arc::new(MemorySessionStore::new());
        let state = AppState::with_session_store(config, sessions.clone()).unwrap();
        let app = skillsfront::build_router(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        Self {
            addr,
            issuer_url,
            state,
            sessions,
            upstream,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// GET with an optional `Cookie` header
    pub async fn get(&self, path: &str, cookie: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url(path));
        if let Some(cookie) = cookie {
            request = request.header("Cookie", cookie);
        }
        request.send().await.unwrap()
    }

    /// Start a login; returns the session cookie and the issued `state`.
    pub async fn begin_login(&self) -> (String, String) {
        let response = self.get("/login", None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let cookie = session_cookie(&response).expect("login sets a session cookie");
        let state = query_param(location(&response), "state").expect("state in redirect");
        (cookie, state)
    }

    /// Run the whole login flow with `code`; returns the session cookie.
    pub async fn login_with_code(&self, code: &str) -> String {
        let (cookie, state) = self.begin_login().await;

        let response = self
            .get(
                &format!("/authorization-code/callback?code={code}&state={state}"),
                Some(&cookie),
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/skills");

        session_cookie(&response).unwrap_or(cookie)
    }

    /// The one session held by the store.
    pub async fn only_session(&self) -> Session {
        let mut sessions = self.sessions.snapshot().await;
        assert_eq!(sessions.len(), 1, "expected exactly one session");
        sessions.remove(0).1
    }

    pub fn resource_calls(&self) -> usize {
        *self.upstream.resource_calls.lock().unwrap()
    }
}

/// `name=value` of the session cookie set by `response`, if any.
pub fn session_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|raw| raw.starts_with(&format!("{COOKIE_NAME}=")))
        .and_then(|raw| raw.split(';').next())
        .map(ToString::to_string)
}

/// Raw `Set-Cookie` header values
pub fn set_cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok().map(ToString::to_string))
        .collect()
}

pub fn location(response: &reqwest::Response) -> &str {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .expect("location header")
}

pub fn query_param(url: &str, name: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

// =============================================================================
// Fake identity provider
// =============================================================================

/// Codes understood by the fake token endpoint:
/// - `good`: tokens `T` / `I`
/// - `stale`: a token the resource server rejects
/// - `broken`: a token the resource server fails on
/// - `sluggish`: a token the resource server answers late for
/// - `slow`: answers after the client timeout
/// - anything else: 400
fn provider_router(upstream: FakeUpstreams) -> Router {
    Router::new()
        .route("/oauth2/default/v1/token", post(token))
        .with_state(upstream)
}

async fn token(
    State(upstream): State<FakeUpstreams>,
    TypedHeader(Authorization(basic)): TypedHeader<Authorization<Basic>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    if basic.username() != CLIENT_ID || basic.password() != CLIENT_SECRET {
        return (StatusCode::UNAUTHORIZED, "invalid_client").into_response();
    }

    let code = form.get("code").cloned().unwrap_or_default();
    upstream.token_requests.lock().unwrap().push(form);

    let access_token = match code.as_str() {
        "good" => "T",
        "stale" => "expired",
        "broken" => "broken",
        "sluggish" => "slow",
        "slow" => {
            tokio::time::sleep(std::time::Duration::from_secs(3)).await;
            "T"
        }
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "invalid_grant" })),
            )
                .into_response();
        }
    };

    Json(serde_json::json!({
        "access_token": access_token,
        "id_token": "I",
        "token_type": "Bearer",
        "expires_in": 3600,
        "scope": "openid profile read_skills write_skills",
    }))
    .into_response()
}

// =============================================================================
// Fake resource server
// =============================================================================

fn resource_router(upstream: FakeUpstreams) -> Router {
    Router::new()
        .route("/", get(list_skills).post(add_skills))
        .with_state(upstream)
}

async fn check_token(upstream: &FakeUpstreams, token: &str) -> Result<(), Response> {
    *upstream.resource_calls.lock().unwrap() += 1;
    match token {
        "T" => Ok(()),
        "slow" => {
            tokio::time::sleep(std::time::Duration::from_secs(3)).await;
            Ok(())
        }
        "expired" => Err(StatusCode::UNAUTHORIZED.into_response()),
        _ => Err(StatusCode::INTERNAL_SERVER_ERROR.into_response()),
    }
}

async fn list_skills(
    State(upstream): State<FakeUpstreams>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
) -> Response {
    if let Err(response) = check_token(&upstream, bearer.token()).await {
        return response;
    }
    let skills = upstream.skills.lock().unwrap().clone();
    Json(SkillsPayload { skills }).into_response()
}

async fn add_skills(
    State(upstream): State<FakeUpstreams>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<SkillsPayload>,
) -> Response {
    if let Err(response) = check_token(&upstream, bearer.token()).await {
        return response;
    }
    upstream
        .skills
        .lock()
        .unwrap()
        .extend(payload.skills.iter().cloned());
    upstream.posted.lock().unwrap().push(payload.skills);
    StatusCode::CREATED.into_response()
}
