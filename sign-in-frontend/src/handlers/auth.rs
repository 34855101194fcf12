use crate::identity::PendingAuthState;
use crate::signin::{PendingNavigation, SignInOutcome};
use crate::AppState;
use askama::Template;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

pub const AUTH_STATE_COOKIE: &str = "auth_state";

#[derive(Template)]
#[template(path = "sign_in.html")]
pub struct SignInTemplate {
    pub authenticating: bool,
}

pub async fn sign_in_page(State(state): State<AppState>, jar: CookieJar) -> Response {
    run_sign_in(&state, jar).await
}

/// Runs one render of the sign-in view and turns the outcome into a response.
pub(crate) async fn run_sign_in(state: &AppState, jar: CookieJar) -> Response {
    let navigation = PendingNavigation::default();
    let outcome = state.orchestrator.on_render(&navigation).await;

    match outcome {
        SignInOutcome::AlreadySignedIn => {
            Redirect::to(state.orchestrator.landing_route()).into_response()
        }
        SignInOutcome::InFlight => SignInTemplate {
            authenticating: true,
        }
        .into_response(),
        SignInOutcome::Failed(_) => SignInTemplate {
            authenticating: false,
        }
        .into_response(),
        SignInOutcome::Redirecting => {
            let jar = if state.store_auth_state_in_cookie {
                match state.identity.pending_auth_state().await {
                    Some(pending) => jar.add(auth_state_cookie(&pending)),
                    None => jar,
                }
            } else {
                jar
            };
            navigate(jar, navigation)
        }
        SignInOutcome::Authenticated(_) => {
            navigate(jar.remove(Cookie::from(AUTH_STATE_COOKIE)), navigation)
        }
    }
}

fn navigate(jar: CookieJar, navigation: PendingNavigation) -> Response {
    match navigation.take() {
        Some(target) => (jar, Redirect::to(&target)).into_response(),
        None => (
            jar,
            SignInTemplate {
                authenticating: true,
            },
        )
            .into_response(),
    }
}

fn auth_state_cookie(pending: &PendingAuthState) -> Cookie<'static> {
    Cookie::build((AUTH_STATE_COOKIE, pending.to_cookie_value()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(10))
        .build()
}

pub(crate) fn restored_auth_state(state: &AppState, jar: &CookieJar) -> Option<PendingAuthState> {
    if !state.store_auth_state_in_cookie {
        return None;
    }
    jar.get(AUTH_STATE_COOKIE)
        .and_then(|cookie| PendingAuthState::from_cookie_value(cookie.value()))
}

pub async fn sign_out_handler(State(state): State<AppState>, jar: CookieJar) -> Response {
    let target = state
        .orchestrator
        .sign_out()
        .await
        .unwrap_or_else(|| "/".to_string());

    (
        jar.remove(Cookie::from(AUTH_STATE_COOKIE)),
        Redirect::to(&target),
    )
        .into_response()
}
