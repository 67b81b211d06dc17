//! Configuration files for the storage server and the proxy.
//!
//! Both are plain JSON documents. Every server field has a default so the
//! server can boot without a file; the proxy needs at least one route.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Upper bound for backend delegation, proxy handshakes and forwarded requests.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_server_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_proxy_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub data_dir: PathBuf,
    /// Pre-shared key a proxy must present on `/connect`. Without it the
    /// server does not answer handshakes.
    pub connection_key: Option<String>,
    pub backend: Option<BackendConfig>,
    pub delegation: DelegationConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_server_bind(),
            data_dir: PathBuf::from("data"),
            connection_key: None,
            backend: None,
            delegation: DelegationConfig::default(),
        }
    }
}

/// Which operations are handed to the external backend.
///
/// `default` applies to every tenant without an entry in `tenants`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DelegationConfig {
    pub default: Vec<String>,
    pub tenants: HashMap<String, Vec<String>>,
}

/// Statically configured backend implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    Http {
        base_url: String,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_proxy_bind")]
    pub bind: SocketAddr,
    #[serde(default)]
    pub proxy_id: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    pub routes: Vec<ProxyRouteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyRouteConfig {
    pub path: String,
    #[serde(alias = "servers")]
    pub targets: Vec<ProxyTargetConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyTargetConfig {
    pub url: String,
    /// Pre-shared connection key sent as `X-Connection-Key` during the handshake.
    pub key: String,
}

pub async fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading config file {}", path.display()))?;

    serde_json::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults_from_empty_document() {
        let config: ServerConfig = serde_json::from_str("{}").unwrap();

        assert_eq!(config.bind, default_server_bind());
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert!(config.backend.is_none());
        assert!(config.delegation.default.is_empty());
    }

    #[test]
    fn test_backend_config_is_tagged_by_kind() {
        let config: ServerConfig = serde_json::from_value(serde_json::json!({
            "backend": { "kind": "http", "base_url": "http://127.0.0.1:4001" },
            "delegation": { "tenants": { "orders": ["READ"] } }
        }))
        .unwrap();

        match config.backend {
            Some(BackendConfig::Http {
                base_url,
                timeout_ms,
            }) => {
                assert_eq!(base_url, "http://127.0.0.1:4001");
                assert_eq!(timeout_ms, DEFAULT_TIMEOUT_MS);
            }
            None => panic!("backend should be configured"),
        }
        assert_eq!(config.delegation.tenants["orders"], vec!["READ"]);
    }

    #[test]
    fn test_proxy_config_accepts_servers_alias() {
        let config: ProxyConfig = serde_json::from_value(serde_json::json!({
            "routes": [{
                "path": "/api",
                "servers": [{ "url": "http://server1.example.com", "key": "server1-connection-key" }]
            }]
        }))
        .unwrap();

        assert_eq!(config.bind, default_proxy_bind());
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(config.routes[0].targets.len(), 1);
        assert_eq!(config.routes[0].targets[0].key, "server1-connection-key");
    }

    #[test]
    fn test_proxy_config_requires_routes() {
        let result = serde_json::from_str::<ProxyConfig>("{}");
        assert!(result.is_err());
    }
}
