//! Backend Delegation
//!
//! Delegated operations go through the `Backend` trait. Implementations are
//! chosen from static configuration at startup; nothing is ever loaded from a
//! remote location.

use super::protocol::{DelegatedRequest, DelegatedResponse, Operation};
use crate::config::BackendConfig;
use crate::error::{Error, Result};

use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Boxed future returned by `Backend::forward`, so the trait stays object safe.
pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = Result<DelegatedResponse>> + Send + 'a>>;

/// An external service that can serve tenant operations.
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    /// Serves `operation` for `tenant`. Non-2xx answers are `BackendError`,
    /// unreachable backends and timeouts are `BackendUnavailable`.
    fn forward<'a>(
        &'a self,
        tenant: &'a str,
        operation: &'a Operation,
        request: DelegatedRequest,
    ) -> BackendFuture<'a>;
}

/// Builds the backend named by the configuration.
pub fn from_config(config: &BackendConfig) -> Arc<dyn Backend> {
    match config {
        BackendConfig::Http {
            base_url,
            timeout_ms,
        } => Arc::new(HttpBackend::new(base_url, Duration::from_millis(*timeout_ms))),
    }
}

/// Forwards to `{base_url}/api/{tenant}/{operation}` over HTTP.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn url_for(&self, tenant: &str, operation: &Operation) -> String {
        format!(
            "{}/api/{}/{}",
            self.base_url,
            tenant,
            operation.name().to_ascii_lowercase()
        )
    }

    async fn send(
        &self,
        tenant: &str,
        operation: &Operation,
        request: DelegatedRequest,
    ) -> Result<DelegatedResponse> {
        let url = self.url_for(tenant, operation);
        tracing::debug!("Delegating {} {} to {}", request.method, operation.name(), url);

        let mut builder = self
            .client
            .request(request.method, &url)
            .timeout(self.timeout)
            .body(request.body);
        if let Some(content_type) = request.content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!("Backend at {} unreachable: {}", url, e);
            Error::BackendUnavailable(e.to_string())
        })?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::BackendUnavailable(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!("Backend answered {} for {}", status, url);
            return Err(Error::BackendError {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(DelegatedResponse {
            status,
            content_type,
            body,
        })
    }
}

impl Backend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    fn forward<'a>(
        &'a self,
        tenant: &'a str,
        operation: &'a Operation,
        request: DelegatedRequest,
    ) -> BackendFuture<'a> {
        Box::pin(self.send(tenant, operation, request))
    }
}
