use super::{HostBridge, HostContext, HostError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use service_core::observability::TracedClientExt;

#[derive(Debug, Deserialize)]
struct AuthTokenResponse {
    #[serde(default)]
    token: String,
}

/// Host bridge reached over HTTP at a host-provided endpoint.
pub struct HttpHostBridge {
    client: Client,
    base_url: String,
}

impl HttpHostBridge {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, HostError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(HostError::Status(response.status()))
    }
}

#[async_trait]
impl HostBridge for HttpHostBridge {
    async fn initialize(&self) -> Result<(), HostError> {
        let response = self.client.traced_post(&self.url("/app/initialize")).send().await?;
        ensure_success(response)?;
        Ok(())
    }

    async fn get_context(&self) -> Result<HostContext, HostError> {
        let response = self.client.traced_get(&self.url("/app/context")).send().await?;
        Ok(ensure_success(response)?.json().await?)
    }

    async fn get_auth_token(&self) -> Result<String, HostError> {
        let response = self
            .client
            .traced_get(&self.url("/authentication/token"))
            .send()
            .await?;
        let body: AuthTokenResponse = ensure_success(response)?.json().await?;

        if body.token.is_empty() {
            return Err(HostError::EmptyToken);
        }
        Ok(body.token)
    }
}
