//! Bridge to the collaboration host that may embed the app.

mod detect;
mod detached;
mod http_bridge;

pub use detached::DetachedHost;
pub use detect::{detect_environment, Environment};
pub use http_bridge::HttpHostBridge;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostContext {
    pub host_name: Option<String>,
    pub tenant_id: Option<String>,
    pub login_hint: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Not running inside a host container")]
    NotEmbedded,

    #[error("Host bridge returned {0}")]
    Status(reqwest::StatusCode),

    #[error("Host returned an empty auth token")]
    EmptyToken,

    #[error("Host bridge request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait HostBridge: Send + Sync {
    /// May never complete when the host does not answer; callers bound it.
    async fn initialize(&self) -> Result<(), HostError>;

    async fn get_context(&self) -> Result<HostContext, HostError>;

    /// Short-lived client-side token issued by the host for this app.
    async fn get_auth_token(&self) -> Result<String, HostError>;
}
