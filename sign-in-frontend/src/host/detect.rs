use super::{HostBridge, HostContext, HostError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Host(HostContext),
    Standalone,
}

/// Decides whether the app runs inside the host container.
///
/// The probe (initialize, then context) runs on its own task and reports
/// through a one-shot channel. Whichever comes first, the probe result or
/// `timeout`, decides; a probe that finishes after the deadline finds the
/// receiver gone and its result is dropped. The probe itself is not
/// cancelled since the host offers no way to abort initialization.
pub async fn detect_environment(bridge: Arc<dyn HostBridge>, timeout: Duration) -> Environment {
    let (tx, rx) = oneshot::channel::<Result<HostContext, HostError>>();

    tokio::spawn(async move {
        let probe = async {
            bridge.initialize().await?;
            bridge.get_context().await
        };
        let _ = tx.send(probe.await);
    });

    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(Ok(context))) => Environment::Host(context),
        Ok(Ok(Err(e))) => {
            tracing::debug!(error = %e, "Host initialization failed");
            Environment::Standalone
        }
        Ok(Err(_)) => {
            tracing::warn!("Host probe ended without reporting");
            Environment::Standalone
        }
        Err(_) => {
            tracing::info!(timeout_ms = timeout.as_millis() as u64, "Host initialization timed out");
            Environment::Standalone
        }
    }
}
