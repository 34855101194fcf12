use super::{AccountInfo, IdentityError};
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct IdTokenClaims {
    pub oid: Option<String>,
    pub sub: Option<String>,
    pub tid: Option<String>,
    pub preferred_username: Option<String>,
    pub name: Option<String>,
}

/// Decode ID token claims without validation.
///
/// The token was just received from the provider's token endpoint over TLS;
/// it is only read to identify the account in the cache, never to authorize.
pub fn decode_id_token_claims(token: &str) -> Result<IdTokenClaims, IdentityError> {
    let parts: Vec<&str> = token.split('.').collect();

    if parts.len() != 3 {
        return Err(IdentityError::InvalidIdToken("Invalid JWT format".to_string()));
    }

    let payload = general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| IdentityError::InvalidIdToken(format!("Failed to decode payload: {}", e)))?;

    serde_json::from_slice(&payload)
        .map_err(|e| IdentityError::InvalidIdToken(format!("Failed to parse claims: {}", e)))
}

impl IdTokenClaims {
    /// `home_account_id` follows the identity platform's `{oid}.{tid}` form,
    /// falling back to `sub` for tokens without an object id.
    pub fn into_account(self) -> AccountInfo {
        let tenant_id = self.tid.unwrap_or_default();
        let object_id = self.oid.or(self.sub).unwrap_or_default();

        AccountInfo {
            home_account_id: format!("{}.{}", object_id, tenant_id),
            tenant_id,
            username: self.preferred_username.unwrap_or_default(),
            name: self.name,
        }
    }
}
