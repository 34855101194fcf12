pub mod config;
pub mod handlers;
pub mod host;
pub mod identity;
pub mod models;
pub mod services;
pub mod signin;
pub mod startup;

use identity::PublicClientApplication;
use signin::{SignInOrchestrator, UserStore};
use std::sync::Arc;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SignInOrchestrator>,
    pub identity: Arc<PublicClientApplication>,
    pub users: Arc<dyn UserStore>,
    /// Mirror pending redirect state into a cookie.
    pub store_auth_state_in_cookie: bool,
}
