use super::cache::{CachedAccessToken, CachedAccount, PendingAuthState, TokenCache};
use super::id_token::decode_id_token_claims;
use super::pkce::{generate_state, PkceChallenge};
use super::{
    AccountInfo, AuthenticationResult, IdentityClient, IdentityError, RedirectRequest,
    SilentRequest,
};
use crate::config::IdentitySettings;
use crate::signin::Navigator;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Mutex;

/// Added to every request so the provider returns an ID token and a refresh token.
const OIDC_SCOPES: &[&str] = &["openid", "profile", "offline_access"];

/// Cached access tokens closer than this to expiry are renewed.
const EXPIRY_OFFSET_SECONDS: i64 = 300;

/// Query of a request to the redirect URI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedirectParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl RedirectParams {
    pub fn is_callback(&self) -> bool {
        self.code.is_some() || self.error.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Public client against the Microsoft identity platform v2 endpoints.
pub struct PublicClientApplication {
    http: Client,
    client_id: String,
    authority: String,
    redirect_uri: String,
    cache: TokenCache,
    captured: Mutex<Option<RedirectParams>>,
}

impl PublicClientApplication {
    pub async fn new(settings: &IdentitySettings, public_url: &str) -> Result<Self, IdentityError> {
        let cache = TokenCache::open(settings.cache_location, settings.cache_path.clone()).await?;
        Ok(Self::with_cache(settings, public_url, cache))
    }

    pub fn with_cache(settings: &IdentitySettings, public_url: &str, cache: TokenCache) -> Self {
        if settings.allow_native_broker {
            tracing::warn!("Native broker sign-in is not supported; ignoring allow_native_broker");
        }

        Self {
            http: Client::new(),
            client_id: settings.client_id.clone(),
            authority: settings.authority(),
            redirect_uri: settings.absolute_redirect_uri(public_url),
            cache,
            captured: Mutex::new(None),
        }
    }

    /// Hands the redirect URI's query to the client; the next
    /// [`IdentityClient::handle_redirect_promise`] consumes it.
    ///
    /// `restored` is auth state mirrored into a cookie, used only when the
    /// client itself no longer holds a pending sign-in.
    pub async fn capture_redirect(
        &self,
        params: RedirectParams,
        restored: Option<PendingAuthState>,
    ) {
        if let Some(restored) = restored {
            if self.cache.pending().await.is_none() {
                tracing::debug!("Restoring pending sign-in from auth state cookie");
                if let Err(e) = self.cache.set_pending(Some(restored)).await {
                    tracing::warn!(error = %e, "Failed to restore pending sign-in");
                }
            }
        }

        match self.captured.lock() {
            Ok(mut captured) => *captured = Some(params),
            Err(poisoned) => *poisoned.into_inner() = Some(params),
        }
    }

    pub async fn pending_auth_state(&self) -> Option<PendingAuthState> {
        self.cache.pending().await
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/oauth2/v2.0/{}", self.authority, name)
    }

    fn take_captured(&self) -> Option<RedirectParams> {
        match self.captured.lock() {
            Ok(mut captured) => captured.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    fn authorize_url(&self, pending: &PendingAuthState, code_challenge: &str) -> String {
        let scope = request_scopes(&pending.scopes);
        let query = serde_urlencoded::to_string([
            ("client_id", self.client_id.as_str()),
            ("response_type", "code"),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("response_mode", "query"),
            ("scope", scope.as_str()),
            ("state", pending.state.as_str()),
            ("code_challenge", code_challenge),
            ("code_challenge_method", "S256"),
        ])
        .unwrap_or_default();

        format!("{}?{}", self.endpoint("authorize"), query)
    }

    async fn redeem_code(
        &self,
        code: &str,
        pending: PendingAuthState,
    ) -> Result<AuthenticationResult, IdentityError> {
        let scope = request_scopes(&pending.scopes);
        let response = self
            .token_request(&[
                ("client_id", self.client_id.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("code_verifier", pending.code_verifier.as_str()),
                ("scope", scope.as_str()),
            ])
            .await?;

        self.store(response, pending.scopes, None).await
    }

    async fn refresh(
        &self,
        entry: CachedAccount,
        scopes: Vec<String>,
    ) -> Result<AuthenticationResult, IdentityError> {
        let refresh_token = entry.refresh_token.clone().ok_or_else(|| {
            IdentityError::InteractionRequired("no refresh token for account".to_string())
        })?;
        let scope = request_scopes(&scopes);

        let response = self
            .token_request(&[
                ("client_id", self.client_id.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("scope", scope.as_str()),
            ])
            .await
            .map_err(|e| match e {
                IdentityError::TokenEndpoint { error, .. }
                    if error == "invalid_grant" || error == "interaction_required" =>
                {
                    IdentityError::InteractionRequired(error)
                }
                other => other,
            })?;

        self.store(response, scopes, Some(entry)).await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, IdentityError> {
        let url = self.endpoint("token");
        let response = self.http.post(&url).form(form).send().await.map_err(|e| {
            tracing::error!("Failed to send token request to {}: {}", url, e);
            IdentityError::Transport(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body: Option<TokenErrorResponse> = response.json().await.ok();
            let (error, description) = body
                .map(|b| (b.error, b.error_description.unwrap_or_default()))
                .unwrap_or_else(|| ("unknown_error".to_string(), String::new()));
            tracing::error!(status = %status, error = %error, description = %description, "Token endpoint error");
            return Err(IdentityError::TokenEndpoint { status, error });
        }

        Ok(response.json().await?)
    }

    /// Caches a token response. The account comes from the ID token when one
    /// was returned, otherwise from the entry being refreshed.
    async fn store(
        &self,
        response: TokenResponse,
        scopes: Vec<String>,
        previous: Option<CachedAccount>,
    ) -> Result<AuthenticationResult, IdentityError> {
        let account = match (&response.id_token, &previous) {
            (Some(id_token), _) => decode_id_token_claims(id_token)?.into_account(),
            (None, Some(previous)) => previous.account.clone(),
            (None, None) => {
                return Err(IdentityError::InvalidIdToken(
                    "token response carried no ID token".to_string(),
                ))
            }
        };

        let expires_on = Utc::now() + Duration::seconds(response.expires_in);
        let refresh_token = response
            .refresh_token
            .or_else(|| previous.and_then(|p| p.refresh_token));

        self.cache
            .upsert(CachedAccount {
                account: account.clone(),
                access_token: Some(CachedAccessToken {
                    secret: response.access_token.clone(),
                    scopes: scopes.clone(),
                    expires_on,
                }),
                refresh_token,
            })
            .await?;

        Ok(AuthenticationResult {
            access_token: response.access_token,
            account,
            scopes,
            expires_on,
        })
    }
}

#[async_trait]
impl IdentityClient for PublicClientApplication {
    async fn handle_redirect_promise(&self) -> Result<Option<AuthenticationResult>, IdentityError> {
        let Some(params) = self.take_captured() else {
            return Ok(None);
        };
        let pending = self.cache.take_pending().await?;

        if let Some(error) = params.error {
            return Err(IdentityError::Provider {
                error,
                description: params.error_description.unwrap_or_default(),
            });
        }

        let pending = pending.ok_or(IdentityError::MissingAuthState)?;
        if params.state.as_deref() != Some(pending.state.as_str()) {
            return Err(IdentityError::StateMismatch);
        }
        let code = params.code.unwrap_or_default();

        let result = self.redeem_code(&code, pending).await?;
        tracing::info!(account = %result.account.username, "Redirect sign-in completed");
        Ok(Some(result))
    }

    async fn all_accounts(&self) -> Vec<AccountInfo> {
        self.cache.accounts().await
    }

    async fn acquire_token_silent(
        &self,
        request: SilentRequest,
    ) -> Result<AuthenticationResult, IdentityError> {
        let entry = self
            .cache
            .find(&request.account.home_account_id)
            .await
            .ok_or_else(|| IdentityError::InteractionRequired("account not in cache".to_string()))?;

        let fresh_until = Utc::now() + Duration::seconds(EXPIRY_OFFSET_SECONDS);
        if let Some(token) = &entry.access_token {
            let covers_scopes = request.scopes.iter().all(|s| token.scopes.contains(s));
            if covers_scopes && token.expires_on > fresh_until {
                tracing::debug!(account = %entry.account.username, "Using cached access token");
                return Ok(AuthenticationResult {
                    access_token: token.secret.clone(),
                    account: entry.account.clone(),
                    scopes: token.scopes.clone(),
                    expires_on: token.expires_on,
                });
            }
        }

        tracing::debug!(account = %entry.account.username, "Renewing access token with refresh token");
        self.refresh(entry, request.scopes).await
    }

    async fn login_redirect(
        &self,
        request: RedirectRequest,
        navigator: &dyn Navigator,
    ) -> Result<(), IdentityError> {
        let pkce = PkceChallenge::generate();
        let pending = PendingAuthState {
            state: generate_state(),
            code_verifier: pkce.verifier,
            scopes: request.scopes,
            created_at: Utc::now(),
        };
        let url = self.authorize_url(&pending, &pkce.challenge);
        self.cache.set_pending(Some(pending)).await?;

        tracing::info!("Redirecting to identity provider for sign-in");
        navigator.navigate(&url);
        Ok(())
    }

    async fn logout(&self) -> Result<Option<String>, IdentityError> {
        if !self.cache.clear().await? {
            return Ok(None);
        }

        let query = serde_urlencoded::to_string([(
            "post_logout_redirect_uri",
            self.redirect_uri.as_str(),
        )])
        .unwrap_or_default();
        Ok(Some(format!("{}?{}", self.endpoint("logout"), query)))
    }
}

fn request_scopes(scopes: &[String]) -> String {
    let mut all: Vec<&str> = scopes.iter().map(String::as_str).collect();
    for scope in OIDC_SCOPES {
        if !all.contains(scope) {
            all.push(scope);
        }
    }
    all.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::login_scopes;
    use crate::signin::PendingNavigation;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(authority_host: &str) -> IdentitySettings {
        IdentitySettings {
            client_id: "client-123".to_string(),
            tenant_id: "contoso".to_string(),
            authority_host: authority_host.to_string(),
            ..Default::default()
        }
    }

    fn client(authority_host: &str) -> PublicClientApplication {
        PublicClientApplication::with_cache(
            &settings(authority_host),
            "http://localhost:3000",
            TokenCache::in_memory(),
        )
    }

    fn id_token() -> String {
        let claims = json!({
            "oid": "oid-1",
            "tid": "contoso-tid",
            "preferred_username": "adele@contoso.com",
            "name": "Adele Vance"
        });
        format!(
            "eyJhbGciOiJub25lIn0.{}.sig",
            URL_SAFE_NO_PAD.encode(claims.to_string())
        )
    }

    fn query_param(url: &str, name: &str) -> Option<String> {
        let query = url.split_once('?')?.1;
        serde_urlencoded::from_str::<Vec<(String, String)>>(query)
            .ok()?
            .into_iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    async fn start_redirect(client: &PublicClientApplication) -> String {
        let navigation = PendingNavigation::default();
        client
            .login_redirect(RedirectRequest::login(), &navigation)
            .await
            .unwrap();
        navigation.take().unwrap()
    }

    #[tokio::test]
    async fn login_redirect_navigates_to_authorize_endpoint() {
        let client = client("https://login.microsoftonline.com");
        let url = start_redirect(&client).await;

        assert!(url.starts_with("https://login.microsoftonline.com/contoso/oauth2/v2.0/authorize?"));
        assert_eq!(query_param(&url, "client_id").as_deref(), Some("client-123"));
        assert_eq!(
            query_param(&url, "redirect_uri").as_deref(),
            Some("http://localhost:3000/")
        );
        assert_eq!(
            query_param(&url, "scope").as_deref(),
            Some("User.Read openid profile offline_access")
        );
        assert_eq!(query_param(&url, "code_challenge_method").as_deref(), Some("S256"));

        let pending = client.pending_auth_state().await.unwrap();
        assert_eq!(query_param(&url, "state"), Some(pending.state));
        assert_eq!(pending.scopes, login_scopes());
    }

    #[tokio::test]
    async fn no_callback_means_no_result() {
        let client = client("https://login.microsoftonline.com");
        assert!(client.handle_redirect_promise().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn redirect_callback_redeems_code_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/contoso/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=auth-code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "T1",
                "refresh_token": "R1",
                "id_token": id_token(),
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let url = start_redirect(&client).await;
        client
            .capture_redirect(
                RedirectParams {
                    code: Some("auth-code".to_string()),
                    state: query_param(&url, "state"),
                    ..Default::default()
                },
                None,
            )
            .await;

        let result = client.handle_redirect_promise().await.unwrap().unwrap();
        assert_eq!(result.access_token, "T1");
        assert_eq!(result.account.home_account_id, "oid-1.contoso-tid");
        assert_eq!(client.all_accounts().await, vec![result.account.clone()]);

        assert!(client.handle_redirect_promise().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mismatched_state_is_rejected() {
        let client = client("https://login.microsoftonline.com");
        start_redirect(&client).await;
        client
            .capture_redirect(
                RedirectParams {
                    code: Some("auth-code".to_string()),
                    state: Some("forged".to_string()),
                    ..Default::default()
                },
                None,
            )
            .await;

        assert!(matches!(
            client.handle_redirect_promise().await,
            Err(IdentityError::StateMismatch)
        ));
    }

    #[tokio::test]
    async fn provider_error_in_callback_is_reported() {
        let client = client("https://login.microsoftonline.com");
        start_redirect(&client).await;
        client
            .capture_redirect(
                RedirectParams {
                    error: Some("access_denied".to_string()),
                    error_description: Some("The user cancelled".to_string()),
                    ..Default::default()
                },
                None,
            )
            .await;

        let err = client.handle_redirect_promise().await.unwrap_err();
        assert!(matches!(err, IdentityError::Provider { ref error, .. } if error == "access_denied"));
        assert!(client.pending_auth_state().await.is_none());
    }

    #[tokio::test]
    async fn cookie_state_is_used_when_client_lost_it() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/contoso/oauth2/v2.0/token"))
            .and(body_string_contains("code_verifier=kept-verifier"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "T2",
                "id_token": id_token()
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let restored = PendingAuthState {
            state: "cookie-state".to_string(),
            code_verifier: "kept-verifier".to_string(),
            scopes: login_scopes(),
            created_at: Utc::now(),
        };
        client
            .capture_redirect(
                RedirectParams {
                    code: Some("auth-code".to_string()),
                    state: Some("cookie-state".to_string()),
                    ..Default::default()
                },
                Some(restored),
            )
            .await;

        let result = client.handle_redirect_promise().await.unwrap().unwrap();
        assert_eq!(result.access_token, "T2");
    }

    #[tokio::test]
    async fn silent_uses_cached_token_then_refreshes_when_near_expiry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/contoso/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "short-lived",
                "refresh_token": "R1",
                "id_token": id_token(),
                "expires_in": 60
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/contoso/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=R1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "renewed",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let url = start_redirect(&client).await;
        client
            .capture_redirect(
                RedirectParams {
                    code: Some("auth-code".to_string()),
                    state: query_param(&url, "state"),
                    ..Default::default()
                },
                None,
            )
            .await;
        let first = client.handle_redirect_promise().await.unwrap().unwrap();

        let renewed = client
            .acquire_token_silent(SilentRequest::login(first.account.clone()))
            .await
            .unwrap();
        assert_eq!(renewed.access_token, "renewed");
        assert_eq!(renewed.account, first.account);

        // Now fresh for an hour: served from cache, refresh mock stays at one call.
        let cached = client
            .acquire_token_silent(SilentRequest::login(first.account))
            .await
            .unwrap();
        assert_eq!(cached.access_token, "renewed");
    }

    #[tokio::test]
    async fn silent_for_unknown_account_requires_interaction() {
        let client = client("https://login.microsoftonline.com");
        let account = AccountInfo {
            home_account_id: "nobody.t1".to_string(),
            tenant_id: "t1".to_string(),
            username: String::new(),
            name: None,
        };

        assert!(matches!(
            client.acquire_token_silent(SilentRequest::login(account)).await,
            Err(IdentityError::InteractionRequired(_))
        ));
    }

    #[tokio::test]
    async fn logout_returns_end_session_url_only_with_accounts() {
        let client = client("https://login.microsoftonline.com");
        assert_eq!(client.logout().await.unwrap(), None);

        client
            .cache
            .upsert(CachedAccount {
                account: AccountInfo {
                    home_account_id: "oid-1.contoso-tid".to_string(),
                    tenant_id: "contoso-tid".to_string(),
                    username: "adele@contoso.com".to_string(),
                    name: None,
                },
                access_token: None,
                refresh_token: None,
            })
            .await
            .unwrap();

        let url = client.logout().await.unwrap().unwrap();
        assert!(url.starts_with("https://login.microsoftonline.com/contoso/oauth2/v2.0/logout?"));
        assert!(client.all_accounts().await.is_empty());
    }
}
