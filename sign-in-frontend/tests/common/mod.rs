//! Hand-written collaborators for sign-in flow tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::StatusCode;
use sign_in_frontend::host::{HostBridge, HostContext, HostError};
use sign_in_frontend::identity::{
    AccountInfo, AuthenticationResult, IdentityClient, IdentityError, RedirectRequest,
    SilentRequest,
};
use sign_in_frontend::models::User;
use sign_in_frontend::services::{ExchangeError, ProfileError, ProfileSource, TokenExchange};
use sign_in_frontend::signin::{CurrentUser, Navigator, SignInOrchestrator, UserStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const AUTHORIZE_URL: &str = "https://login.example.com/authorize";

pub fn account(id: &str) -> AccountInfo {
    AccountInfo {
        home_account_id: format!("{}.tenant", id),
        tenant_id: "tenant".to_string(),
        username: format!("{}@contoso.com", id),
        name: None,
    }
}

pub fn auth_result(access_token: &str) -> AuthenticationResult {
    AuthenticationResult {
        access_token: access_token.to_string(),
        account: account("adele"),
        scopes: vec!["User.Read".to_string()],
        expires_on: Utc::now() + Duration::hours(1),
    }
}

#[derive(Default)]
pub struct MockIdentity {
    pub redirect_result: Mutex<Option<AuthenticationResult>>,
    pub accounts: Vec<AccountInfo>,
    /// `None` makes silent acquisition fail with interaction required.
    pub silent_token: Option<String>,
    pub login_redirect_fails: bool,
    pub logout_url: Option<String>,
    pub logout_fails: bool,
    pub handle_redirect_calls: AtomicUsize,
    pub all_accounts_calls: AtomicUsize,
    pub silent_calls: AtomicUsize,
    pub login_redirect_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
}

impl MockIdentity {
    pub fn with_redirect_result(access_token: &str) -> Self {
        Self {
            redirect_result: Mutex::new(Some(auth_result(access_token))),
            ..Default::default()
        }
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityClient for MockIdentity {
    async fn handle_redirect_promise(&self) -> Result<Option<AuthenticationResult>, IdentityError> {
        self.handle_redirect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.redirect_result.lock().unwrap().take())
    }

    async fn all_accounts(&self) -> Vec<AccountInfo> {
        self.all_accounts_calls.fetch_add(1, Ordering::SeqCst);
        self.accounts.clone()
    }

    async fn acquire_token_silent(
        &self,
        request: SilentRequest,
    ) -> Result<AuthenticationResult, IdentityError> {
        self.silent_calls.fetch_add(1, Ordering::SeqCst);
        match &self.silent_token {
            Some(token) => Ok(AuthenticationResult {
                account: request.account,
                ..auth_result(token)
            }),
            None => Err(IdentityError::InteractionRequired(
                "refresh token expired".to_string(),
            )),
        }
    }

    async fn login_redirect(
        &self,
        _request: RedirectRequest,
        navigator: &dyn Navigator,
    ) -> Result<(), IdentityError> {
        self.login_redirect_calls.fetch_add(1, Ordering::SeqCst);
        if self.login_redirect_fails {
            return Err(IdentityError::Cache("read-only file system".to_string()));
        }
        navigator.navigate(AUTHORIZE_URL);
        Ok(())
    }

    async fn logout(&self) -> Result<Option<String>, IdentityError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if self.logout_fails {
            return Err(IdentityError::Cache("disk full".to_string()));
        }
        Ok(self.logout_url.clone())
    }
}

pub enum HostMode {
    /// `initialize` never settles.
    Silent,
    /// Not embedded: `initialize` fails right away.
    Detached,
    Embedded { token: String },
    /// Embedded, but the host refuses to issue a token.
    TokenUnavailable,
}

pub struct MockHost {
    pub mode: HostMode,
    pub initialize_calls: AtomicUsize,
    pub token_calls: AtomicUsize,
}

impl MockHost {
    pub fn new(mode: HostMode) -> Self {
        Self {
            mode,
            initialize_calls: AtomicUsize::new(0),
            token_calls: AtomicUsize::new(0),
        }
    }

    pub fn embedded(token: &str) -> Self {
        Self::new(HostMode::Embedded {
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl HostBridge for MockHost {
    async fn initialize(&self) -> Result<(), HostError> {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            HostMode::Silent => std::future::pending().await,
            HostMode::Detached => Err(HostError::NotEmbedded),
            HostMode::Embedded { .. } | HostMode::TokenUnavailable => Ok(()),
        }
    }

    async fn get_context(&self) -> Result<HostContext, HostError> {
        Ok(HostContext {
            host_name: Some("Teams".to_string()),
            ..Default::default()
        })
    }

    async fn get_auth_token(&self) -> Result<String, HostError> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            HostMode::Embedded { token } => Ok(token.clone()),
            HostMode::TokenUnavailable => Err(HostError::EmptyToken),
            _ => Err(HostError::NotEmbedded),
        }
    }
}

pub struct MockExchange {
    pub result: Result<String, StatusCode>,
    pub tokens: Mutex<Vec<String>>,
}

impl MockExchange {
    pub fn succeeding(access_token: &str) -> Self {
        Self {
            result: Ok(access_token.to_string()),
            tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(status: StatusCode) -> Self {
        Self {
            result: Err(status),
            tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.tokens.lock().unwrap().len()
    }
}

#[async_trait]
impl TokenExchange for MockExchange {
    async fn exchange(&self, client_token: &str) -> Result<String, ExchangeError> {
        self.tokens.lock().unwrap().push(client_token.to_string());
        self.result.clone().map_err(ExchangeError::Status)
    }
}

#[derive(Default)]
pub struct MockProfile {
    pub tokens: Mutex<Vec<String>>,
    /// Access tokens the profile endpoint rejects with 401.
    pub rejected: Vec<String>,
}

impl MockProfile {
    pub fn rejecting(access_token: &str) -> Self {
        Self {
            rejected: vec![access_token.to_string()],
            ..Default::default()
        }
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProfileSource for MockProfile {
    async fn fetch_profile(&self, access_token: &str) -> Result<User, ProfileError> {
        self.tokens.lock().unwrap().push(access_token.to_string());
        if self.rejected.iter().any(|t| t == access_token) {
            return Err(ProfileError::Status(StatusCode::UNAUTHORIZED));
        }
        Ok(User {
            first_name: "Adele".to_string(),
            last_name: "Vance".to_string(),
            display_name: "Adele Vance".to_string(),
            email_address: "adele@contoso.com".to_string(),
            phone_number: String::new(),
        })
    }
}

/// A user store whose first read misses and every later read sees a user,
/// as when another attempt finishes between two reads.
#[derive(Default)]
pub struct LateUserStore {
    reads: AtomicUsize,
    cleared: std::sync::atomic::AtomicBool,
}

impl UserStore for LateUserStore {
    fn current(&self) -> Option<User> {
        let first = self.reads.fetch_add(1, Ordering::SeqCst) == 0;
        if first || self.cleared.load(Ordering::SeqCst) {
            return None;
        }
        Some(User {
            display_name: "Adele Vance".to_string(),
            ..Default::default()
        })
    }

    fn set(&self, _user: User) {}

    fn clear(&self) {
        self.cleared.store(true, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub orchestrator: Arc<SignInOrchestrator>,
    pub identity: Arc<MockIdentity>,
    pub host: Arc<MockHost>,
    pub exchange: Arc<MockExchange>,
    pub profile: Arc<MockProfile>,
    pub users: Arc<CurrentUser>,
}

impl Harness {
    pub fn new(identity: MockIdentity, host: MockHost, exchange: MockExchange) -> Self {
        Self::with_profile(identity, host, exchange, MockProfile::default())
    }

    pub fn with_profile(
        identity: MockIdentity,
        host: MockHost,
        exchange: MockExchange,
        profile: MockProfile,
    ) -> Self {
        let identity = Arc::new(identity);
        let host = Arc::new(host);
        let exchange = Arc::new(exchange);
        let profile = Arc::new(profile);
        let users = Arc::new(CurrentUser::default());

        let orchestrator = SignInOrchestrator::new(
            identity.clone(),
            host.clone(),
            exchange.clone(),
            profile.clone(),
            users.clone(),
        )
        .with_landing_route("/home");

        Self {
            orchestrator: Arc::new(orchestrator),
            identity,
            host,
            exchange,
            profile,
            users,
        }
    }

    pub fn standalone(identity: MockIdentity) -> Self {
        Self::new(
            identity,
            MockHost::new(HostMode::Detached),
            MockExchange::succeeding("unused"),
        )
    }
}
