use crate::identity::CacheLocation;
use serde::Deserialize;
use service_core::config::load_settings;
use service_core::error::AppError;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
pub const DEFAULT_GRAPH_ME_ENDPOINT: &str = "https://graph.microsoft.com/v1.0/me";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub identity: IdentitySettings,
    pub api: ApiSettings,
    pub graph: GraphSettings,
    pub host: HostSettings,
    pub observability: ObservabilitySettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Browser-visible origin, used to absolutize a relative redirect URI.
    pub public_url: String,
    /// Route the user is sent to once signed in.
    pub landing_route: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            public_url: "http://localhost:3000".to_string(),
            landing_route: "/".to_string(),
        }
    }
}

/// Public-client registration with the identity platform.
///
/// `client_id` and `tenant_id` default to empty strings: a missing
/// registration is reported by the identity provider, not at startup.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IdentitySettings {
    pub client_id: String,
    pub tenant_id: String,
    pub authority_host: String,
    pub redirect_uri: String,
    pub cache_location: CacheLocation,
    /// Where a `localStorage` cache is persisted.
    pub cache_path: PathBuf,
    pub store_auth_state_in_cookie: bool,
    pub allow_native_broker: bool,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            tenant_id: String::new(),
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            redirect_uri: "/".to_string(),
            cache_location: CacheLocation::LocalStorage,
            cache_path: PathBuf::from(".sign-in-cache.json"),
            store_auth_state_in_cookie: true,
            allow_native_broker: false,
        }
    }
}

impl IdentitySettings {
    /// `https://login.microsoftonline.com/{tenant_id}`
    pub fn authority(&self) -> String {
        format!(
            "{}/{}",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }

    /// The redirect URI as registered with the provider. Relative values are
    /// resolved against the server's public URL.
    pub fn absolute_redirect_uri(&self, public_url: &str) -> String {
        if self.redirect_uri.starts_with("http://") || self.redirect_uri.starts_with("https://") {
            return self.redirect_uri.clone();
        }
        format!(
            "{}/{}",
            public_url.trim_end_matches('/'),
            self.redirect_uri.trim_start_matches('/')
        )
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ApiSettings {
    /// Base URL of the backend hosting the on-behalf-of exchange.
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GraphSettings {
    pub me_endpoint: String,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            me_endpoint: DEFAULT_GRAPH_ME_ENDPOINT.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HostSettings {
    /// Host-container bridge endpoint. Unset means the app never runs embedded.
    pub bridge_url: Option<String>,
    pub init_timeout_ms: u64,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            bridge_url: None,
            init_timeout_ms: 10_000,
        }
    }
}

impl HostSettings {
    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ObservabilitySettings {
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            otlp_endpoint: None,
        }
    }
}

/// Short variable names accepted alongside the `APP_` prefixed ones.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("identity.client_id", "SSO_CLIENT_ID"),
    ("identity.tenant_id", "SSO_TENANT_ID"),
    ("api.base_url", "API_BASE_URL"),
];

pub fn get_configuration() -> Result<Settings, AppError> {
    let base_path = std::env::current_dir()?;

    // Check if we're already in sign-in-frontend directory or need to navigate to it
    let configuration_directory = if base_path.ends_with("sign-in-frontend") {
        base_path.join("config")
    } else {
        base_path.join("sign-in-frontend").join("config")
    };

    load_settings(&configuration_directory, ENV_OVERRIDES)
}
