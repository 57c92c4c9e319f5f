use std::path::Path;

use serde::Deserialize;

use crate::error::{ConfigError, Result};

fn default_gateway_host() -> String {
    "0.0.0.0".to_string()
}
fn default_gateway_port() -> u16 {
    9710
}
fn default_gateway_ping_interval_secs() -> f64 {
    1.0
}
fn default_queue_database_url() -> String {
    "sqlite://qdata_queue.db".to_string()
}
fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/1".to_string()
}
fn default_max_process() -> usize {
    qdata_protocol::defaults::DEFAULT_MAX_PROCESS
}
fn default_max_concurrency() -> usize {
    10
}
fn default_inactivity_timeout_secs() -> f64 {
    5.0
}
fn default_client_version() -> String {
    qdata_protocol::defaults::DEFAULT_CLIENT_VERSION_SPEC.to_string()
}
fn default_lock_ttl_secs() -> u64 {
    qdata_protocol::defaults::DEFAULT_LOCK_TTL_SECS
}
fn default_lease_timeout_secs() -> i64 {
    qdata_protocol::defaults::DEFAULT_LEASE_TIMEOUT_SECS
}
fn default_provider_uri() -> String {
    "/data/provider".to_string()
}

/// The fabric's full configuration, built once at startup and shared by
/// `Arc` thereafter. Replaces the original service's global mutable
/// `Config`/`C` singleton (spec Open Question #1): every component takes
/// an explicit `&Config` or `Arc<Config>` instead of reading process-wide
/// state.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_gateway_host")]
    pub gateway_host: String,
    #[serde(default = "default_gateway_port")]
    pub gateway_port: u16,
    #[serde(default = "default_gateway_ping_interval_secs")]
    pub gateway_ping_interval_secs: f64,

    #[serde(default = "default_queue_database_url")]
    pub queue_database_url: String,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    #[serde(default = "default_max_process")]
    pub max_process: usize,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_inactivity_timeout_secs")]
    pub inactivity_timeout_secs: f64,

    #[serde(default = "default_client_version")]
    pub client_version: String,

    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
    #[serde(default = "default_lease_timeout_secs")]
    pub lease_timeout_secs: i64,

    #[serde(default = "default_provider_uri")]
    pub provider_uri: String,
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str("").expect("empty document satisfies every #[serde(default)] field")
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qdata.toml");
        std::fs::write(&path, "").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.gateway_port, 9710);
        assert_eq!(config.max_process, 10);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qdata.toml");
        std::fs::write(&path, "gateway_port = 9999\nmax_process = 4\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.gateway_port, 9999);
        assert_eq!(config.max_process, 4);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = Config::load("/nonexistent/qdata.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
