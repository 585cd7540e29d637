use std::env;
use std::time::Duration;

use scene::cluster::DEFAULT_CLUSTER_THRESHOLD_KM;
use scene::visibility::DEFAULT_ALTITUDE_THRESHOLD_M;

pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    /// Base URL of the image service.
    pub service_url: String,
    pub cluster_threshold_km: f64,
    pub altitude_threshold_m: f64,
    pub fetch_timeout: Duration,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            cluster_threshold_km: DEFAULT_CLUSTER_THRESHOLD_KM,
            altitude_threshold_m: DEFAULT_ALTITUDE_THRESHOLD_M,
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
        }
    }
}

impl DashboardConfig {
    /// Reads `DASHBOARD_SERVICE_URL`, `CLUSTER_THRESHOLD_KM`,
    /// `ALTITUDE_THRESHOLD_M` and `FETCH_TIMEOUT_MS`. Unset or unparsable
    /// values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            service_url: env::var("DASHBOARD_SERVICE_URL").unwrap_or(defaults.service_url),
            cluster_threshold_km: env_var_f64("CLUSTER_THRESHOLD_KM", defaults.cluster_threshold_km),
            altitude_threshold_m: env_var_f64("ALTITUDE_THRESHOLD_M", defaults.altitude_threshold_m),
            fetch_timeout: Duration::from_millis(env_var_u64(
                "FETCH_TIMEOUT_MS",
                DEFAULT_FETCH_TIMEOUT_MS,
            )),
        }
    }

    pub fn with_service_url(mut self, url: impl Into<String>) -> Self {
        self.service_url = url.into();
        self
    }

    pub fn with_cluster_threshold_km(mut self, km: f64) -> Self {
        self.cluster_threshold_km = km;
        self
    }

    pub fn with_altitude_threshold_m(mut self, meters: f64) -> Self {
        self.altitude_threshold_m = meters;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }
}

fn env_var_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|v: &f64| v.is_finite())
        .unwrap_or(default)
}

fn env_var_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
