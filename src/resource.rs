//! Skills resource server client
//!
//! Relays skills listing and creation with the session's bearer token.

use std::time::Instant;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::metrics::{UPSTREAM_REQUEST_DURATION_SECONDS, record_upstream};

/// Wire payload in both directions: `{"skills": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillsPayload {
    pub skills: Vec<String>,
}

/// Client for the configured resource server root
#[derive(Debug, Clone)]
pub struct ResourceClient {
    endpoint: String,
    http: reqwest::Client,
}

impl ResourceClient {
    pub fn new(base_url: &str, http: reqwest::Client) -> Self {
        Self {
            endpoint: format!("{}/", base_url.trim_end_matches('/')),
            http,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// GET the caller's skills.
    ///
    /// # Errors
    /// [`AppError::TokenRejected`] on 401, [`AppError::Timeout`] on timeout,
    /// [`AppError::ResourceServer`] otherwise.
    pub async fn list_skills(&self, access_token: &str) -> Result<Vec<String>> {
        let started = Instant::now();
        let result = self.fetch_skills(access_token).await;
        observe("list_skills", started, &result);
        result
    }

    /// POST `skills` to the resource server.
    pub async fn add_skills(&self, access_token: &str, skills: Vec<String>) -> Result<()> {
        let started = Instant::now();
        let result = self.post_skills(access_token, skills).await;
        observe("add_skills", started, &result);
        result
    }

    async fn fetch_skills(&self, access_token: &str) -> Result<Vec<String>> {
        let response = self
            .http
            .get(&self.endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| send_error("skills listing", e))?;
        let payload: SkillsPayload = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| send_error("skills listing", e))?;
        Ok(payload.skills)
    }

    async fn post_skills(&self, access_token: &str, skills: Vec<String>) -> Result<()> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(access_token)
            .json(&SkillsPayload { skills })
            .send()
            .await
            .map_err(|e| send_error("skills creation", e))?;
        ensure_success(response).await?;
        Ok(())
    }
}

/// Split form input into skills.
///
/// Entries are separated by `,`, trimmed, and empty entries are dropped.
pub fn parse_skills(input: &str) -> Result<Vec<String>> {
    let skills: Vec<String> = input
        .split(',')
        .map(str::trim)
        .filter(|skill| !skill.is_empty())
        .map(ToOwned::to_owned)
        .collect();

    if skills.is_empty() {
        return Err(AppError::Validation(
            "Enter at least one skill.".to_string(),
        ));
    }
    Ok(skills)
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(AppError::TokenRejected);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AppError::ResourceServer(format!(
        "resource server returned {status}: {body}"
    )))
}

fn send_error(operation: &'static str, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Timeout(operation)
    } else {
        AppError::ResourceServer(format!("{operation}: {err}"))
    }
}

fn observe<T>(target: &'static str, started: Instant, result: &Result<T>) {
    UPSTREAM_REQUEST_DURATION_SECONDS
        .with_label_values(&[target])
        .observe(started.elapsed().as_secs_f64());
    record_upstream(target, if result.is_ok() { "success" } else { "failure" });
}
