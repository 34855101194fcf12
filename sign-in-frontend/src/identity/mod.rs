//! Identity client for the standalone (browser) sign-in path.
//!
//! [`IdentityClient`] is the seam the sign-in orchestrator depends on;
//! [`PublicClientApplication`] implements it against the Microsoft identity
//! platform using the authorization-code flow with PKCE.

mod cache;
mod client;
pub mod id_token;
pub mod pkce;

pub use cache::{CacheLocation, PendingAuthState, TokenCache};
pub use client::{PublicClientApplication, RedirectParams};

use crate::signin::Navigator;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Scopes requested for both redirect login and silent acquisition.
pub const LOGIN_SCOPES: &[&str] = &["User.Read"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub home_account_id: String,
    pub tenant_id: String,
    pub username: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthenticationResult {
    pub access_token: String,
    pub account: AccountInfo,
    pub scopes: Vec<String>,
    pub expires_on: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SilentRequest {
    pub scopes: Vec<String>,
    pub account: AccountInfo,
}

impl SilentRequest {
    pub fn login(account: AccountInfo) -> Self {
        Self {
            scopes: login_scopes(),
            account,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedirectRequest {
    pub scopes: Vec<String>,
}

impl RedirectRequest {
    pub fn login() -> Self {
        Self {
            scopes: login_scopes(),
        }
    }
}

pub fn login_scopes() -> Vec<String> {
    LOGIN_SCOPES.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Identity provider returned {error}: {description}")]
    Provider { error: String, description: String },

    #[error("Redirect state does not match the pending sign-in")]
    StateMismatch,

    #[error("No pending sign-in for this redirect")]
    MissingAuthState,

    #[error("Interaction required: {0}")]
    InteractionRequired(String),

    #[error("Token endpoint returned {status}: {error}")]
    TokenEndpoint {
        status: reqwest::StatusCode,
        error: String,
    },

    #[error("Invalid ID token: {0}")]
    InvalidIdToken(String),

    #[error("Identity request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Token cache error: {0}")]
    Cache(String),
}

/// The operations the sign-in flow needs from an identity client.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Completes a redirect login whose callback has arrived, at most once
    /// per callback. `None` when no callback is pending.
    async fn handle_redirect_promise(&self) -> Result<Option<AuthenticationResult>, IdentityError>;

    async fn all_accounts(&self) -> Vec<AccountInfo>;

    async fn acquire_token_silent(
        &self,
        request: SilentRequest,
    ) -> Result<AuthenticationResult, IdentityError>;

    /// Starts an interactive login by navigating away to the provider.
    async fn login_redirect(
        &self,
        request: RedirectRequest,
        navigator: &dyn Navigator,
    ) -> Result<(), IdentityError>;

    /// Forgets cached accounts. Returns the provider's end-session URL when
    /// there was an account to sign out of.
    async fn logout(&self) -> Result<Option<String>, IdentityError>;
}
