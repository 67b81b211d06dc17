use super::registry::KeyRegistry;
use super::types::{Authorized, PresentedKeys, Scope};
use crate::error::{Error, Result};

use std::sync::Arc;

/// Checks presented keys against a required scope. Never mutates anything.
pub struct AccessController {
    registry: Arc<KeyRegistry>,
}

impl AccessController {
    pub fn new(registry: Arc<KeyRegistry>) -> Arc<Self> {
        Arc::new(Self { registry })
    }

    /// `MasterOnly` accepts the master key alone. `TenantOrMaster` accepts the
    /// master key or any key of the named tenant, and reports an unknown
    /// tenant as `NotFound` rather than `Forbidden`.
    pub async fn authorize(&self, keys: &PresentedKeys, scope: &Scope) -> Result<Authorized> {
        for candidate in keys.master_candidates() {
            if self.registry.is_master_key(candidate).await {
                tracing::debug!("Master key accepted for {:?}", scope);
                return Ok(Authorized::Master);
            }
        }

        match scope {
            Scope::MasterOnly => {
                tracing::debug!("Master key required, access denied");
                Err(Error::Forbidden)
            }
            Scope::TenantOrMaster(name) => {
                let record = self
                    .registry
                    .get_tenant(name)
                    .ok_or_else(|| Error::NotFound(format!("tenant '{}'", name)))?;

                match keys.api_key.as_deref() {
                    Some(key) if record.holds_key(key) => {
                        tracing::debug!("Access granted for tenant '{}'", name);
                        Ok(Authorized::Tenant(name.clone()))
                    }
                    _ => {
                        tracing::debug!("Access denied for tenant '{}'", name);
                        Err(Error::Forbidden)
                    }
                }
            }
        }
    }
}
