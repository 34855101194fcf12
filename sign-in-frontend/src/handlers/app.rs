use crate::handlers::auth::{restored_auth_state, run_sign_in};
use crate::identity::RedirectParams;
use crate::models::User;
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub user: User,
}

/// Landing page and redirect URI.
///
/// A provider callback is handed to the identity client first; then the
/// signed-in user is shown, or the sign-in flow runs.
pub async fn index(
    State(state): State<AppState>,
    Query(params): Query<RedirectParams>,
    jar: CookieJar,
) -> Response {
    if params.is_callback() {
        tracing::info!("Processing sign-in redirect callback");
        let restored = restored_auth_state(&state, &jar);
        state.identity.capture_redirect(params, restored).await;
    }

    match state.users.current() {
        Some(user) => IndexTemplate { user }.into_response(),
        None => run_sign_in(&state, jar).await,
    }
}

pub async fn health_check() -> &'static str {
    "OK"
}
