use super::router::ProxyRouter;
use super::types::{ENDPOINT_PROXY_HEALTH, RouteStatus};
use crate::error::Result;

use axum::{
    Extension, Json, Router,
    extract::Request,
    response::Response,
    routing::get,
};
use std::sync::Arc;

/// Catch-all: every path except the health report is forwarded.
pub async fn handle_proxy(
    Extension(router): Extension<Arc<ProxyRouter>>,
    request: Request,
) -> Result<Response> {
    router.forward(request).await
}

pub async fn handle_health(
    Extension(router): Extension<Arc<ProxyRouter>>,
) -> Json<Vec<RouteStatus>> {
    Json(router.health_snapshot().await)
}

pub fn build_router(router: Arc<ProxyRouter>) -> Router {
    Router::new()
        .route(ENDPOINT_PROXY_HEALTH, get(handle_health))
        .fallback(handle_proxy)
        .layer(Extension(router))
}
