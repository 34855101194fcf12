use super::{Navigator, UserStore};
use crate::host::{detect_environment, Environment, HostBridge, HostError};
use crate::identity::{IdentityClient, IdentityError, RedirectRequest, SilentRequest};
use crate::models::User;
use crate::services::metrics;
use crate::services::{ExchangeError, ProfileError, ProfileSource, TokenExchange};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_HOST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SignInError {
    #[error("Host token unavailable: {0}")]
    Host(#[from] HostError),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInPhase {
    Idle,
    Authenticating,
    Authenticated,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    /// A user is already in the store; nothing was attempted.
    AlreadySignedIn,
    /// Another attempt holds the in-flight flag.
    InFlight,
    Authenticated(User),
    /// An interactive login was started; it resumes on the redirect URI.
    Redirecting,
    Failed(String),
}

impl SignInOutcome {
    fn label(&self) -> &'static str {
        match self {
            SignInOutcome::AlreadySignedIn => "already_signed_in",
            SignInOutcome::InFlight => "in_flight",
            SignInOutcome::Authenticated(_) => "authenticated",
            SignInOutcome::Redirecting => "redirecting",
            SignInOutcome::Failed(_) => "failed",
        }
    }
}

/// Holds the in-flight flag for one attempt and releases it on drop.
///
/// An attempt dropped before it finished (the request went away) leaves the
/// phase at `Authenticating`; the guard puts it back to `Idle` first.
struct AttemptGuard<'a> {
    flag: &'a AtomicBool,
    phase: &'a Mutex<SignInPhase>,
}

impl<'a> AttemptGuard<'a> {
    fn acquire(flag: &'a AtomicBool, phase: &'a Mutex<SignInPhase>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag, phase })
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        let mut phase = match self.phase.lock() {
            Ok(phase) => phase,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *phase == SignInPhase::Authenticating {
            *phase = SignInPhase::Idle;
        }
        drop(phase);
        self.flag.store(false, Ordering::Release);
    }
}

/// Runs sign-in: host single sign-on when embedded, the identity client
/// otherwise, and the identity client once more if host sign-on fails.
pub struct SignInOrchestrator {
    identity: Arc<dyn IdentityClient>,
    host: Arc<dyn HostBridge>,
    exchange: Arc<dyn TokenExchange>,
    profile: Arc<dyn ProfileSource>,
    users: Arc<dyn UserStore>,
    host_timeout: Duration,
    landing_route: String,
    authenticating: AtomicBool,
    phase: Mutex<SignInPhase>,
}

impl SignInOrchestrator {
    pub fn new(
        identity: Arc<dyn IdentityClient>,
        host: Arc<dyn HostBridge>,
        exchange: Arc<dyn TokenExchange>,
        profile: Arc<dyn ProfileSource>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            identity,
            host,
            exchange,
            profile,
            users,
            host_timeout: DEFAULT_HOST_TIMEOUT,
            landing_route: "/".to_string(),
            authenticating: AtomicBool::new(false),
            phase: Mutex::new(SignInPhase::Idle),
        }
    }

    pub fn with_host_timeout(mut self, timeout: Duration) -> Self {
        self.host_timeout = timeout;
        self
    }

    pub fn with_landing_route(mut self, route: impl Into<String>) -> Self {
        self.landing_route = route.into();
        self
    }

    pub fn landing_route(&self) -> &str {
        &self.landing_route
    }

    pub fn phase(&self) -> SignInPhase {
        match self.phase.lock() {
            Ok(phase) => *phase,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn is_authenticating(&self) -> bool {
        self.authenticating.load(Ordering::Acquire)
    }

    fn set_phase(&self, next: SignInPhase) {
        match self.phase.lock() {
            Ok(mut phase) => *phase = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Entry point for every render of a view that needs a user.
    ///
    /// Does nothing when a user is present or another attempt is running.
    /// Whatever the outcome, the in-flight flag is released on return so a
    /// later render can retry.
    pub async fn on_render(&self, navigator: &dyn Navigator) -> SignInOutcome {
        let outcome = self.attempt(navigator).await;
        metrics::record_outcome(outcome.label());
        outcome
    }

    async fn attempt(&self, navigator: &dyn Navigator) -> SignInOutcome {
        if self.users.current().is_some() {
            return SignInOutcome::AlreadySignedIn;
        }
        let Some(_attempt) = AttemptGuard::acquire(&self.authenticating, &self.phase) else {
            tracing::debug!("Sign-in already in progress");
            return SignInOutcome::InFlight;
        };
        // An attempt may have completed between the check above and the acquire.
        if self.users.current().is_some() {
            return SignInOutcome::AlreadySignedIn;
        }

        self.set_phase(SignInPhase::Authenticating);
        let outcome = self.authenticate(navigator).await;

        self.set_phase(match &outcome {
            SignInOutcome::Authenticated(_) => SignInPhase::Authenticated,
            SignInOutcome::Failed(_) => SignInPhase::Failed,
            _ => SignInPhase::Idle,
        });
        outcome
    }

    async fn authenticate(&self, navigator: &dyn Navigator) -> SignInOutcome {
        match detect_environment(self.host.clone(), self.host_timeout).await {
            Environment::Host(context) => {
                tracing::info!(
                    host = context.host_name.as_deref().unwrap_or("unknown"),
                    "Running in host container"
                );
                metrics::record_attempt("host");

                match self.authenticate_in_host().await {
                    Ok(user) => return self.complete(user, navigator),
                    Err(e) => {
                        tracing::warn!(error = %e, "Error during host single sign-on, falling back to standalone sign-in");
                        metrics::record_host_fallback();
                    }
                }
            }
            Environment::Standalone => {
                tracing::info!("Running standalone");
                metrics::record_attempt("standalone");
            }
        }

        match self.authenticate_standalone(navigator).await {
            Ok(Some(user)) => self.complete(user, navigator),
            Ok(None) => SignInOutcome::Redirecting,
            Err(e) => {
                tracing::error!(error = %e, "Authentication error");
                SignInOutcome::Failed(e.to_string())
            }
        }
    }

    async fn authenticate_in_host(&self) -> Result<User, SignInError> {
        let client_token = self.host.get_auth_token().await?;
        let access_token = self.exchange.exchange(&client_token).await?;
        Ok(self.profile.fetch_profile(&access_token).await?)
    }

    /// `Ok(None)` means an interactive redirect was started.
    async fn authenticate_standalone(
        &self,
        navigator: &dyn Navigator,
    ) -> Result<Option<User>, SignInError> {
        if let Some(result) = self.identity.handle_redirect_promise().await? {
            tracing::debug!("Completing redirect sign-in");
            return Ok(Some(self.profile.fetch_profile(&result.access_token).await?));
        }

        if let Some(account) = self.identity.all_accounts().await.into_iter().next() {
            tracing::debug!(account = %account.username, "Acquiring token silently");
            let result = self
                .identity
                .acquire_token_silent(SilentRequest::login(account))
                .await?;
            return Ok(Some(self.profile.fetch_profile(&result.access_token).await?));
        }

        self.identity
            .login_redirect(RedirectRequest::login(), navigator)
            .await?;
        Ok(None)
    }

    fn complete(&self, user: User, navigator: &dyn Navigator) -> SignInOutcome {
        tracing::info!(email = %user.email_address, "User signed in");
        self.users.set(user.clone());
        navigator.navigate(&self.landing_route);
        SignInOutcome::Authenticated(user)
    }

    /// Signs out locally and at the identity client. Never fails: identity
    /// errors are logged and the user cell is cleared regardless. Returns
    /// the provider end-session URL when there is one.
    pub async fn sign_out(&self) -> Option<String> {
        let end_session = match self.identity.logout().await {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(error = %e, "Identity sign-out failed");
                None
            }
        };

        self.users.clear();
        self.set_phase(SignInPhase::Idle);
        tracing::info!("User signed out");
        end_session
    }
}
