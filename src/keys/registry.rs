use super::types::{MasterKeyRecord, TenantRecord};
use super::{MASTER_KEY_BYTES, TENANT_KEY_BYTES, generate_key, keys_match, validate_tenant_name};
use crate::error::{Error, Result};
use crate::store::collection::TenantStore;
use crate::store::persist::{DataDir, read_json, remove_if_exists, write_json_atomic};

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Owns the master key and every tenant's key record.
///
/// Records are held in memory and written through to `metadata/` on every
/// change. All mutations run under one async mutex, which makes
/// check-then-create and check-then-delete atomic.
pub struct KeyRegistry {
    data_dir: Arc<DataDir>,
    store: Arc<TenantStore>,
    master_key: RwLock<String>,
    tenants: DashMap<String, TenantRecord>,
    write_lock: Mutex<()>,
}

impl KeyRegistry {
    /// Loads the master key (generating and persisting one on first run) and
    /// every persisted tenant record.
    pub async fn load(data_dir: Arc<DataDir>, store: Arc<TenantStore>) -> Result<Arc<Self>> {
        let master_file = data_dir.master_file();
        let master_key = match read_json::<MasterKeyRecord>(&master_file).await? {
            Some(record) => {
                tracing::info!("Master key loaded");
                record.master_key
            }
            None => {
                let master_key = generate_key(MASTER_KEY_BYTES);
                write_json_atomic(
                    &master_file,
                    &MasterKeyRecord {
                        master_key: master_key.clone(),
                    },
                )
                .await?;
                tracing::info!("Master key generated and stored in {}", master_file.display());
                master_key
            }
        };

        let tenants = DashMap::new();
        let mut entries = tokio::fs::read_dir(data_dir.metadata_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(name) = DataDir::tenant_from_metadata_file(&path) else {
                continue;
            };

            match read_json::<TenantRecord>(&path).await {
                Ok(Some(mut record)) => {
                    record.name = name.clone();
                    tenants.insert(name, record);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Skipping unreadable tenant record {}: {}", path.display(), e),
            }
        }
        tracing::info!("Loaded {} tenant(s)", tenants.len());

        Ok(Arc::new(Self {
            data_dir,
            store,
            master_key: RwLock::new(master_key),
            tenants,
            write_lock: Mutex::new(()),
        }))
    }

    pub async fn master_key(&self) -> String {
        self.master_key.read().await.clone()
    }

    pub async fn is_master_key(&self, presented: &str) -> bool {
        keys_match(presented, &self.master_key.read().await)
    }

    /// Replaces the master key. The previous key stops validating before this returns.
    pub async fn rotate(&self) -> Result<String> {
        let _write = self.write_lock.lock().await;
        let mut master_key = self.master_key.write().await;

        let new_key = generate_key(MASTER_KEY_BYTES);
        write_json_atomic(
            &self.data_dir.master_file(),
            &MasterKeyRecord {
                master_key: new_key.clone(),
            },
        )
        .await?;
        *master_key = new_key.clone();

        tracing::info!("Master key rotated");
        Ok(new_key)
    }

    pub fn get_tenant(&self, name: &str) -> Option<TenantRecord> {
        self.tenants.get(name).map(|entry| entry.value().clone())
    }

    pub fn list_tenants(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tenants.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Creates a tenant with an empty collection and returns its primary key.
    pub async fn create_tenant(&self, name: &str) -> Result<String> {
        validate_tenant_name(name)?;
        let _write = self.write_lock.lock().await;

        if self.tenants.contains_key(name) {
            return Err(Error::AlreadyExists(name.to_string()));
        }

        let record = TenantRecord::new(name, generate_key(TENANT_KEY_BYTES));
        self.store.initialize(name).await?;
        write_json_atomic(&self.data_dir.metadata_file(name), &record).await?;

        let api_key = record.primary_key.clone();
        self.tenants.insert(name.to_string(), record);

        tracing::info!("Tenant '{}' created", name);
        Ok(api_key)
    }

    /// Issues one more key for an existing tenant.
    pub async fn add_tenant_key(&self, name: &str) -> Result<String> {
        let _write = self.write_lock.lock().await;

        let mut record = self
            .get_tenant(name)
            .ok_or_else(|| Error::NotFound(format!("tenant '{}'", name)))?;

        let new_key = generate_key(TENANT_KEY_BYTES);
        record.additional_keys.push(new_key.clone());
        write_json_atomic(&self.data_dir.metadata_file(name), &record).await?;
        self.tenants.insert(name.to_string(), record);

        tracing::info!("New API key added to tenant '{}'", name);
        Ok(new_key)
    }

    /// Removes the tenant's collection, then its key record. A failure on the
    /// collection leaves the tenant fully in place.
    pub async fn delete_tenant(&self, name: &str) -> Result<()> {
        let _write = self.write_lock.lock().await;

        if !self.tenants.contains_key(name) {
            return Err(Error::NotFound(format!("tenant '{}'", name)));
        }

        if let Err(e) = self.store.drop_collection(name).await {
            tracing::error!("Cannot delete collection of tenant '{}', tenant kept: {}", name, e);
            return Err(e);
        }

        remove_if_exists(&self.data_dir.metadata_file(name)).await?;
        self.tenants.remove(name);

        tracing::info!("Tenant '{}' and its collection deleted", name);
        Ok(())
    }
}
