use super::persist::{DataDir, read_json, remove_if_exists, write_json_atomic};
use crate::error::{Error, Result};

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Ordered document collections, one per tenant.
///
/// Each call loads the whole collection, applies one change and writes the
/// whole collection back. Writers of the same tenant are serialized through a
/// per-tenant `RwLock`; readers share its read half.
pub struct TenantStore {
    data_dir: Arc<DataDir>,
    locks: DashMap<String, Arc<RwLock<()>>>,
}

impl TenantStore {
    pub fn new(data_dir: Arc<DataDir>) -> Arc<Self> {
        Arc::new(Self {
            data_dir,
            locks: DashMap::new(),
        })
    }

    fn lock_for(&self, tenant: &str) -> Arc<RwLock<()>> {
        self.locks
            .entry(tenant.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    async fn load(&self, tenant: &str) -> Result<Vec<Value>> {
        read_json(&self.data_dir.collection_file(tenant))
            .await?
            .ok_or_else(|| Error::NotFound(format!("collection for tenant '{}'", tenant)))
    }

    async fn mutate<F, R>(&self, tenant: &str, change: F) -> Result<R>
    where
        F: FnOnce(&mut Vec<Value>) -> Result<R>,
    {
        let lock = self.lock_for(tenant);
        let _guard = lock.write().await;

        let mut documents = self.load(tenant).await?;
        let outcome = change(&mut documents)?;
        write_json_atomic(&self.data_dir.collection_file(tenant), &documents).await?;

        Ok(outcome)
    }

    /// Writes an empty collection for a freshly created tenant.
    pub async fn initialize(&self, tenant: &str) -> Result<()> {
        let lock = self.lock_for(tenant);
        let _guard = lock.write().await;

        write_json_atomic(&self.data_dir.collection_file(tenant), &Vec::<Value>::new()).await
    }

    /// Deletes the collection. Writers queued behind this call observe `NotFound`.
    pub async fn drop_collection(&self, tenant: &str) -> Result<bool> {
        let lock = self.lock_for(tenant);
        let removed = {
            let _guard = lock.write().await;
            remove_if_exists(&self.data_dir.collection_file(tenant)).await?
        };
        drop(lock);

        // Forget the lock unless another caller still holds a handle to it.
        self.locks
            .remove_if(tenant, |_, lock| Arc::strong_count(lock) == 1);

        Ok(removed)
    }

    #[cfg(test)]
    pub(crate) fn tracked_locks(&self) -> usize {
        self.locks.len()
    }

    pub async fn list(&self, tenant: &str) -> Result<Vec<Value>> {
        let lock = self.lock_for(tenant);
        let _guard = lock.read().await;

        self.load(tenant).await
    }

    /// Appends `doc` and returns the new length.
    pub async fn append(&self, tenant: &str, doc: Value) -> Result<usize> {
        self.mutate(tenant, |documents| {
            documents.push(doc);
            Ok(documents.len())
        })
        .await
    }

    /// Overwrites slot `index`; `index == len` appends. Returns the resulting length.
    pub async fn replace_at(&self, tenant: &str, index: usize, doc: Value) -> Result<usize> {
        self.mutate(tenant, |documents| {
            let len = documents.len();
            match index {
                i if i < len => documents[i] = doc,
                i if i == len => documents.push(doc),
                _ => return Err(Error::OutOfRange { index, len }),
            }
            Ok(documents.len())
        })
        .await
    }

    /// Removes slot `index`, shifting later documents down, and returns the removed document.
    pub async fn remove_at(&self, tenant: &str, index: usize) -> Result<Value> {
        self.mutate(tenant, |documents| {
            let len = documents.len();
            if index >= len {
                return Err(Error::OutOfRange { index, len });
            }
            Ok(documents.remove(index))
        })
        .await
    }
}
