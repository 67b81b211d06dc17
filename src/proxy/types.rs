use serde::{Deserialize, Serialize};

/// Handshake endpoint every target must serve.
pub const ENDPOINT_CONNECT: &str = "/connect";
/// Health report served by the proxy itself.
pub const ENDPOINT_PROXY_HEALTH: &str = "/_proxy/health";

pub const HEADER_CONNECTION_KEY: &str = "x-connection-key";
pub const HEADER_PROXY_ID: &str = "x-proxy-id";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ProxyId(pub String);

impl ProxyId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }
}

impl Default for ProxyId {
    fn default() -> Self {
        Self::new()
    }
}

/// Runtime-only health of a target. Every target starts `Unknown`.
///
/// - `Unknown -> Healthy | Unhealthy`: startup handshake.
/// - `Healthy -> Unhealthy`: forwarding error or timeout.
/// - `Unhealthy -> Healthy`: the reconnect handshake that follows a forwarding error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TargetHealth {
    Unknown,
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeRequest {
    #[serde(rename = "proxyId")]
    pub proxy_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetStatus {
    pub url: String,
    pub health: TargetHealth,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteStatus {
    pub path: String,
    pub targets: Vec<TargetStatus>,
}
