use super::backend::Backend;
use super::policy::{DispatchPolicy, Route};
use super::protocol::{
    DelegatedRequest, DispatchOutcome, Envelope, IndexRef, IndexedDocument, Operation,
};
use crate::error::{Error, Result};
use crate::keys::registry::KeyRegistry;
use crate::store::collection::TenantStore;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;

/// Routes an authorized tenant operation to the store or the backend.
pub struct Dispatcher {
    policy: DispatchPolicy,
    registry: Arc<KeyRegistry>,
    store: Arc<TenantStore>,
    backend: Option<Arc<dyn Backend>>,
}

impl Dispatcher {
    pub fn new(
        policy: DispatchPolicy,
        registry: Arc<KeyRegistry>,
        store: Arc<TenantStore>,
        backend: Option<Arc<dyn Backend>>,
    ) -> Arc<Self> {
        if policy.delegates_anything() && backend.is_none() {
            tracing::warn!("Delegation is configured but no backend is; delegated operations will fail");
        }

        Arc::new(Self {
            policy,
            registry,
            store,
            backend,
        })
    }

    pub async fn dispatch(
        &self,
        tenant: &str,
        operation: &Operation,
        request: DelegatedRequest,
    ) -> Result<DispatchOutcome> {
        if self.registry.get_tenant(tenant).is_none() {
            return Err(Error::NotFound(format!("tenant '{}'", tenant)));
        }

        match self.policy.route(tenant, operation) {
            Route::Delegate => {
                let backend = self.backend.as_ref().ok_or_else(|| {
                    Error::BackendUnavailable("no backend configured".to_string())
                })?;
                tracing::debug!(
                    "{} on '{}' delegated to {} backend",
                    operation.name(),
                    tenant,
                    backend.name()
                );
                let response = backend.forward(tenant, operation, request).await?;
                Ok(DispatchOutcome::Delegated(response))
            }
            Route::Local => {
                let result = self.serve_locally(tenant, operation, &request).await?;
                Ok(DispatchOutcome::Local(Envelope::ok(result)))
            }
        }
    }

    async fn serve_locally(
        &self,
        tenant: &str,
        operation: &Operation,
        request: &DelegatedRequest,
    ) -> Result<Value> {
        match operation {
            Operation::Create => {
                let document: Value = parse_body(request)?;
                let length = self.store.append(tenant, document).await?;
                Ok(completed(operation, json!({ "length": length })))
            }
            Operation::Read => Ok(Value::Array(self.store.list(tenant).await?)),
            Operation::Update => {
                let update: IndexedDocument = parse_body(request)?;
                let length = self
                    .store
                    .replace_at(tenant, update.index, update.document)
                    .await?;
                Ok(completed(operation, json!({ "length": length })))
            }
            Operation::Delete => {
                let target: IndexRef = parse_body(request)?;
                let removed = self.store.remove_at(tenant, target.index).await?;
                Ok(completed(operation, json!({ "removed": removed })))
            }
            Operation::Custom(name) => Err(Error::OperationUnsupported(name.clone())),
        }
    }
}

fn parse_body<T: DeserializeOwned>(request: &DelegatedRequest) -> Result<T> {
    if request.body.is_empty() {
        return Err(Error::InvalidPayload("request body is empty".to_string()));
    }
    serde_json::from_slice(&request.body).map_err(|e| Error::InvalidPayload(e.to_string()))
}

fn completed(operation: &Operation, mut extra: Value) -> Value {
    if let Value::Object(fields) = &mut extra {
        fields.insert(
            "message".to_string(),
            Value::String(format!("{} operation completed successfully", operation.name())),
        );
    }
    extra
}
