//! Metrics collection and Prometheus export.
//!
//! Initializes the metrics exporter, provides the /metrics endpoint body and
//! the sign-in counters.

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the metrics recorder.
///
/// Only the first call installs a recorder; later calls are no-ops.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_some() {
        return;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = METRICS_HANDLE.set(handle);
        }
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus recorder"),
    }
}

/// Get the current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized".to_string())
}

pub fn record_attempt(environment: &'static str) {
    counter!("sign_in_attempts_total", "environment" => environment).increment(1);
}

pub fn record_outcome(outcome: &'static str) {
    counter!("sign_in_outcomes_total", "outcome" => outcome).increment(1);
}

pub fn record_host_fallback() {
    counter!("host_sso_fallbacks_total").increment(1);
}
