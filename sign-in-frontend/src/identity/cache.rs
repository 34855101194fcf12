use super::{AccountInfo, IdentityError};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CacheLocation {
    /// Persisted to disk and reloaded on startup.
    #[default]
    LocalStorage,
    /// Lives as long as the process.
    SessionStorage,
    Memory,
}

/// State and PKCE verifier of a redirect login that has not come back yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthState {
    pub state: String,
    pub code_verifier: String,
    pub scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl PendingAuthState {
    pub fn to_cookie_value(&self) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(self).unwrap_or_default())
    }

    /// Tolerates garbage: an unreadable cookie is just no cookie.
    pub fn from_cookie_value(value: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(value).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedAccessToken {
    pub secret: String,
    pub scopes: Vec<String>,
    pub expires_on: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedAccount {
    pub account: AccountInfo,
    pub access_token: Option<CachedAccessToken>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CacheSnapshot {
    accounts: Vec<CachedAccount>,
    pending: Option<PendingAuthState>,
}

/// Account and token cache of the identity client, keyed by home account id.
pub struct TokenCache {
    location: CacheLocation,
    path: PathBuf,
    inner: Mutex<CacheSnapshot>,
}

impl TokenCache {
    /// Opens the cache, reloading a persisted `localStorage` snapshot when one
    /// exists. A corrupt snapshot is discarded rather than failing startup.
    pub async fn open(location: CacheLocation, path: PathBuf) -> Result<Self, IdentityError> {
        let snapshot = if location == CacheLocation::LocalStorage {
            match tokio::fs::read(&path).await {
                Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                    tracing::warn!(path = %path.display(), error = %e, "Discarding unreadable token cache");
                    CacheSnapshot::default()
                }),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => CacheSnapshot::default(),
                Err(e) => return Err(IdentityError::Cache(e.to_string())),
            }
        } else {
            CacheSnapshot::default()
        };

        Ok(Self {
            location,
            path,
            inner: Mutex::new(snapshot),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            location: CacheLocation::Memory,
            path: PathBuf::new(),
            inner: Mutex::new(CacheSnapshot::default()),
        }
    }

    pub async fn accounts(&self) -> Vec<AccountInfo> {
        let inner = self.inner.lock().await;
        inner.accounts.iter().map(|cached| cached.account.clone()).collect()
    }

    pub async fn find(&self, home_account_id: &str) -> Option<CachedAccount> {
        let inner = self.inner.lock().await;
        inner
            .accounts
            .iter()
            .find(|cached| cached.account.home_account_id == home_account_id)
            .cloned()
    }

    /// Inserts or replaces the entry for the account. The most recent
    /// sign-in is kept first.
    pub async fn upsert(&self, entry: CachedAccount) -> Result<(), IdentityError> {
        let mut inner = self.inner.lock().await;
        inner
            .accounts
            .retain(|cached| cached.account.home_account_id != entry.account.home_account_id);
        inner.accounts.insert(0, entry);
        self.persist(&inner).await
    }

    pub async fn pending(&self) -> Option<PendingAuthState> {
        self.inner.lock().await.pending.clone()
    }

    pub async fn set_pending(&self, pending: Option<PendingAuthState>) -> Result<(), IdentityError> {
        let mut inner = self.inner.lock().await;
        inner.pending = pending;
        self.persist(&inner).await
    }

    pub async fn take_pending(&self) -> Result<Option<PendingAuthState>, IdentityError> {
        let mut inner = self.inner.lock().await;
        let pending = inner.pending.take();
        if pending.is_some() {
            self.persist(&inner).await?;
        }
        Ok(pending)
    }

    /// Drops all accounts and any pending sign-in. Returns whether there was
    /// an account to drop.
    pub async fn clear(&self) -> Result<bool, IdentityError> {
        let mut inner = self.inner.lock().await;
        let had_accounts = !inner.accounts.is_empty();
        *inner = CacheSnapshot::default();
        self.persist(&inner).await?;
        Ok(had_accounts)
    }

    async fn persist(&self, snapshot: &CacheSnapshot) -> Result<(), IdentityError> {
        if self.location != CacheLocation::LocalStorage {
            return Ok(());
        }
        let bytes =
            serde_json::to_vec(snapshot).map_err(|e| IdentityError::Cache(e.to_string()))?;
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| IdentityError::Cache(e.to_string()))
    }
}
