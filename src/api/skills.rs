//! Protected skills pages
//!
//! Every route here runs behind [`require_auth`].

use axum::{
    Form, Router,
    extract::State,
    middleware,
    response::Html,
    routing::get,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use crate::AppState;
use crate::auth::{CurrentSession, require_auth};
use crate::error::{AppError, Result};
use crate::resource::parse_skills;
use crate::views;

pub fn skills_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/skills", get(list_skills))
        .route("/add-skills", get(add_skills_form).post(add_skills))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

/// GET /skills
async fn list_skills(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Result<Html<String>> {
    let result = state.resources.list_skills(current.access_token()?).await;
    let skills = match result {
        Ok(skills) => skills,
        Err(error) => return Err(expire_rejected_token(&state, current, error).await),
    };

    Ok(Html(views::skills_page(&skills)))
}

/// GET /add-skills
async fn add_skills_form() -> Html<String> {
    Html(views::add_skills_page(false))
}

#[derive(Debug, Deserialize)]
struct AddSkillsForm {
    #[serde(default)]
    skills: String,
}

/// POST /add-skills
async fn add_skills(
    State(state): State<AppState>,
    current: CurrentSession,
    WithRejection(Form(form), _): WithRejection<Form<AddSkillsForm>, AppError>,
) -> Result<Html<String>> {
    let skills = parse_skills(&form.skills)?;
    let count = skills.len();

    let result = state
        .resources
        .add_skills(current.access_token()?, skills)
        .await;
    if let Err(error) = result {
        return Err(expire_rejected_token(&state, current, error).await);
    }

    tracing::info!(session_id = %current.id, count, "Skills added");
    Ok(Html(views::add_skills_page(true)))
}

/// Mark the session's token unusable when the resource server refused it,
/// so the gate sends the browser through login again.
async fn expire_rejected_token(
    state: &AppState,
    current: CurrentSession,
    error: AppError,
) -> AppError {
    if matches!(error, AppError::TokenRejected) {
        let CurrentSession { id, mut session } = current;
        session.mark_token_rejected();
        if let Err(store_error) = state.sessions.set(&id, session).await {
            tracing::warn!(error = %store_error, session_id = %id, "Could not mark token as rejected");
        }
    }
    error
}
