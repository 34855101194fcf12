use super::{HostBridge, HostContext, HostError};
use async_trait::async_trait;

/// Bridge for deployments that are never embedded.
pub struct DetachedHost;

#[async_trait]
impl HostBridge for DetachedHost {
    async fn initialize(&self) -> Result<(), HostError> {
        Err(HostError::NotEmbedded)
    }

    async fn get_context(&self) -> Result<HostContext, HostError> {
        Err(HostError::NotEmbedded)
    }

    async fn get_auth_token(&self) -> Result<String, HostError> {
        Err(HostError::NotEmbedded)
    }
}
