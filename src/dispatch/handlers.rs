use super::dispatcher::Dispatcher;
use super::protocol::{DelegatedRequest, DelegatedResponse, DispatchOutcome, Operation};
use crate::error::Result;
use crate::keys::access::AccessController;
use crate::keys::types::{PresentedKeys, Scope};

use axum::{
    Extension, Json,
    body::Bytes,
    extract::Path,
    http::{HeaderMap, HeaderValue, Method, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

pub async fn handle_operation(
    Extension(access): Extension<Arc<AccessController>>,
    Extension(dispatcher): Extension<Arc<Dispatcher>>,
    Path((tenant, operation)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let operation = Operation::parse(&operation);
    tracing::debug!("{} {} on tenant '{}'", method, operation.name(), tenant);

    access
        .authorize(
            &PresentedKeys::from_headers(&headers),
            &Scope::TenantOrMaster(tenant.clone()),
        )
        .await?;

    let request = DelegatedRequest {
        method,
        content_type: headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        body,
    };

    match dispatcher.dispatch(&tenant, &operation, request).await? {
        DispatchOutcome::Local(envelope) => Ok(Json(envelope).into_response()),
        DispatchOutcome::Delegated(response) => Ok(pass_through(response)),
    }
}

fn pass_through(delegated: DelegatedResponse) -> Response {
    let mut response = (delegated.status, delegated.body).into_response();
    match delegated
        .content_type
        .and_then(|value| HeaderValue::from_str(&value).ok())
    {
        Some(content_type) => {
            response.headers_mut().insert(CONTENT_TYPE, content_type);
        }
        None => {
            response.headers_mut().remove(CONTENT_TYPE);
        }
    }
    response
}
