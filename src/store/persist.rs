use crate::error::Result;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const METADATA_DIR: &str = "metadata";
const COLLECTION_DIR: &str = "db";
const MASTER_FILE: &str = "master.json";

/// Resolves where each persisted record lives.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Opens `root`, creating the metadata and collection folders on first use.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let data_dir = Self { root };

        for dir in [data_dir.metadata_dir(), data_dir.collection_dir()] {
            if !tokio::fs::try_exists(&dir).await? {
                tokio::fs::create_dir_all(&dir).await?;
                tracing::info!("Created folder {}", dir.display());
            }
        }

        Ok(data_dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join(METADATA_DIR)
    }

    pub fn collection_dir(&self) -> PathBuf {
        self.root.join(COLLECTION_DIR)
    }

    pub fn master_file(&self) -> PathBuf {
        self.metadata_dir().join(MASTER_FILE)
    }

    pub fn metadata_file(&self, tenant: &str) -> PathBuf {
        self.metadata_dir().join(format!("{}.json", tenant))
    }

    pub fn collection_file(&self, tenant: &str) -> PathBuf {
        self.collection_dir().join(format!("{}.json", tenant))
    }

    /// Name of a tenant metadata file, or `None` for the master key file and
    /// anything that is not a `.json` record.
    pub fn tenant_from_metadata_file(path: &Path) -> Option<String> {
        if path.file_name()?.to_str()? == MASTER_FILE {
            return None;
        }
        if path.extension()?.to_str()? != "json" {
            return None;
        }
        Some(path.file_stem()?.to_str()?.to_string())
    }
}

/// Reads a JSON record. A missing file is `Ok(None)`.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Replaces `path` with the pretty-printed `value` via write-then-rename.
pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = temp_sibling(path);

    if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }

    Ok(())
}

/// Removes `path`. Returns whether a file was actually there.
pub async fn remove_if_exists(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("record");
    path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()))
}
