use super::types::{HEADER_CONNECTION_KEY, HandshakeRequest};
use crate::error::{Error, Result};
use crate::keys::keys_match;

use axum::{
    Extension, Json,
    body::Bytes,
    http::HeaderMap,
};
use serde_json::{Value, json};
use std::sync::Arc;

/// Target side of the proxy handshake.
pub struct HandshakeAcceptor {
    key: String,
}

impl HandshakeAcceptor {
    pub fn new(key: String) -> Arc<Self> {
        Arc::new(Self { key })
    }

    pub fn accepts(&self, headers: &HeaderMap) -> bool {
        headers
            .get(HEADER_CONNECTION_KEY)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|presented| keys_match(presented, &self.key))
    }
}

pub async fn handle_connect(
    Extension(acceptor): Extension<Arc<HandshakeAcceptor>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let proxy_id = serde_json::from_slice::<HandshakeRequest>(&body)
        .map(|request| request.proxy_id)
        .unwrap_or_else(|_| "unknown".to_string());

    if !acceptor.accepts(&headers) {
        tracing::warn!("Rejected handshake from proxy {}", proxy_id);
        return Err(Error::Forbidden);
    }

    tracing::info!("Accepted handshake from proxy {}", proxy_id);
    Ok(Json(json!({ "message": "Connected", "proxyId": proxy_id })))
}
