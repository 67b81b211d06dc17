use super::access::AccessController;
use super::registry::KeyRegistry;
use super::types::{
    KeyIssuedResponse, MasterRotatedResponse, MessageResponse, PresentedKeys, Scope,
    TenantListResponse,
};
use crate::error::Result;

use axum::{
    Extension, Json,
    extract::Path,
    http::{HeaderMap, StatusCode},
};
use std::sync::Arc;

pub async fn handle_create_tenant(
    Extension(access): Extension<Arc<AccessController>>,
    Extension(registry): Extension<Arc<KeyRegistry>>,
    Path(tenant): Path<String>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<KeyIssuedResponse>)> {
    access
        .authorize(&PresentedKeys::from_headers(&headers), &Scope::MasterOnly)
        .await?;

    let api_key = registry.create_tenant(&tenant).await?;

    Ok((
        StatusCode::CREATED,
        Json(KeyIssuedResponse {
            message: "Database created successfully".to_string(),
            api_key,
        }),
    ))
}

pub async fn handle_add_key(
    Extension(access): Extension<Arc<AccessController>>,
    Extension(registry): Extension<Arc<KeyRegistry>>,
    Path(tenant): Path<String>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<KeyIssuedResponse>)> {
    access
        .authorize(&PresentedKeys::from_headers(&headers), &Scope::MasterOnly)
        .await?;

    let api_key = registry.add_tenant_key(&tenant).await?;

    Ok((
        StatusCode::CREATED,
        Json(KeyIssuedResponse {
            message: "New API key added to database".to_string(),
            api_key,
        }),
    ))
}

pub async fn handle_delete_tenant(
    Extension(access): Extension<Arc<AccessController>>,
    Extension(registry): Extension<Arc<KeyRegistry>>,
    Path(tenant): Path<String>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>> {
    access
        .authorize(&PresentedKeys::from_headers(&headers), &Scope::MasterOnly)
        .await?;

    registry.delete_tenant(&tenant).await?;

    Ok(Json(MessageResponse {
        message: "Database and associated metadata deleted".to_string(),
    }))
}

pub async fn handle_rotate_master(
    Extension(access): Extension<Arc<AccessController>>,
    Extension(registry): Extension<Arc<KeyRegistry>>,
    headers: HeaderMap,
) -> Result<Json<MasterRotatedResponse>> {
    access
        .authorize(&PresentedKeys::from_headers(&headers), &Scope::MasterOnly)
        .await?;

    let master_key = registry.rotate().await?;

    Ok(Json(MasterRotatedResponse {
        message: "Master key rotated successfully".to_string(),
        master_key,
    }))
}

pub async fn handle_list_tenants(
    Extension(access): Extension<Arc<AccessController>>,
    Extension(registry): Extension<Arc<KeyRegistry>>,
    headers: HeaderMap,
) -> Result<Json<TenantListResponse>> {
    access
        .authorize(&PresentedKeys::from_headers(&headers), &Scope::MasterOnly)
        .await?;

    Ok(Json(TenantListResponse {
        tenants: registry.list_tenants(),
    }))
}
