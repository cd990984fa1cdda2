use axum::{Router, response::Html, routing::get};

use crate::AppState;
use crate::auth::MaybeSession;
use crate::views;

pub fn home_router() -> Router<AppState> {
    Router::new().route("/", get(home))
}

/// GET /
async fn home(session: MaybeSession) -> Html<String> {
    Html(views::home_page(session.is_authenticated()))
}
