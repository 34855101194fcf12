use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use service_core::observability::TracedClientExt;
use thiserror::Error;

/// Backend route performing the on-behalf-of exchange.
pub const EXCHANGE_PATH: &str = "/getProfileOnBehalfOf";

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("Failed to exchange token: backend returned {0}")]
    Status(StatusCode),

    #[error("Token exchange request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Trades a host-issued client token for a provider access token.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange(&self, client_token: &str) -> Result<String, ExchangeError>;
}

pub struct ExchangeClient {
    client: Client,
    base_url: String,
}

impl ExchangeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TokenExchange for ExchangeClient {
    /// A success response without a usable `accessToken` yields an empty
    /// token; the profile fetch that follows is what fails on it.
    async fn exchange(&self, client_token: &str) -> Result<String, ExchangeError> {
        let url = format!("{}{}", self.base_url, EXCHANGE_PATH);

        let response = self
            .client
            .traced_post(&url)
            .json(&serde_json::json!({ "token": client_token }))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send POST request to {}: {}", url, e);
                ExchangeError::Transport(e)
            })?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Token exchange rejected");
            return Err(ExchangeError::Status(response.status()));
        }

        let body: Value = response.json().await.unwrap_or_default();
        Ok(body
            .get("accessToken")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }
}
