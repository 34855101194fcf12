use dotenvy::dotenv;
use sign_in_frontend::config::get_configuration;
use sign_in_frontend::host::{DetachedHost, HostBridge, HttpHostBridge};
use sign_in_frontend::identity::PublicClientApplication;
use sign_in_frontend::services::{metrics::init_metrics, ExchangeClient, GraphClient};
use sign_in_frontend::signin::{CurrentUser, SignInOrchestrator, UserStore};
use sign_in_frontend::startup::build_router;
use sign_in_frontend::AppState;
use service_core::observability::init_tracing;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "sign-in-frontend",
        &configuration.observability.log_level,
        configuration.observability.otlp_endpoint.as_deref(),
    );
    init_metrics();

    info!(
        client_id = %configuration.identity.client_id,
        tenant_id = %configuration.identity.tenant_id,
        authority = %configuration.identity.authority(),
        "Identity configuration loaded"
    );

    let identity = Arc::new(
        PublicClientApplication::new(&configuration.identity, &configuration.server.public_url)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open token cache: {}", e))?,
    );

    let host: Arc<dyn HostBridge> = match &configuration.host.bridge_url {
        Some(url) => {
            info!(bridge_url = %url, "Host bridge configured");
            Arc::new(HttpHostBridge::new(url.clone()))
        }
        None => Arc::new(DetachedHost),
    };

    let users: Arc<dyn UserStore> = Arc::new(CurrentUser::default());

    let orchestrator = SignInOrchestrator::new(
        identity.clone(),
        host,
        Arc::new(ExchangeClient::new(configuration.api.base_url.clone())),
        Arc::new(GraphClient::new(configuration.graph.me_endpoint.clone())),
        users.clone(),
    )
    .with_host_timeout(configuration.host.init_timeout())
    .with_landing_route(configuration.server.landing_route.clone());

    let app = build_router(AppState {
        orchestrator: Arc::new(orchestrator),
        identity,
        users,
        store_auth_state_in_cookie: configuration.identity.store_auth_state_in_cookie,
    });

    let address = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );
    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!("Starting sign-in-frontend on {}", address);
    axum::serve(listener, app).await.map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
