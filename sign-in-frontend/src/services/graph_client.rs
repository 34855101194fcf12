use crate::models::User;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Profile endpoint returned {0}")]
    Status(StatusCode),

    #[error("Profile request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Fetches the signed-in user's profile with an access token.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn fetch_profile(&self, access_token: &str) -> Result<User, ProfileError>;
}

/// Graph `/me` client.
pub struct GraphClient {
    client: Client,
    me_endpoint: String,
}

impl GraphClient {
    pub fn new(me_endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            me_endpoint: me_endpoint.into(),
        }
    }
}

#[async_trait]
impl ProfileSource for GraphClient {
    async fn fetch_profile(&self, access_token: &str) -> Result<User, ProfileError> {
        let response = self
            .client
            .get(&self.me_endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send GET request to {}: {}", self.me_endpoint, e);
                ProfileError::Request(e)
            })?;

        if !response.status().is_success() {
            return Err(ProfileError::Status(response.status()));
        }

        let profile: Value = response.json().await?;
        Ok(User::from_profile(&profile))
    }
}
