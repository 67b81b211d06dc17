use super::keys_match;

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const HEADER_API_KEY: &str = "x-api-key";
pub const HEADER_MASTER_API_KEY: &str = "x-master-api-key";

/// Persisted key record of one tenant (`metadata/{tenant}.json`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TenantRecord {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "apiKey")]
    pub primary_key: String,
    /// Keys issued after creation, in issue order.
    #[serde(rename = "additionalKeys", default)]
    pub additional_keys: Vec<String>,
    #[serde(rename = "created")]
    pub created_at: DateTime<Utc>,
}

impl TenantRecord {
    pub fn new(name: &str, primary_key: String) -> Self {
        Self {
            name: name.to_string(),
            primary_key,
            additional_keys: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn holds_key(&self, presented: &str) -> bool {
        keys_match(presented, &self.primary_key)
            || self
                .additional_keys
                .iter()
                .any(|key| keys_match(presented, key))
    }
}

/// Persisted master key record (`metadata/master.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterKeyRecord {
    #[serde(rename = "masterKey")]
    pub master_key: String,
}

/// What an operation requires of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    MasterOnly,
    TenantOrMaster(String),
}

/// Which kind of key satisfied the check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorized {
    Master,
    Tenant(String),
}

/// Keys carried by a request.
///
/// `x-api-key` may hold either a tenant key or the master key;
/// `x-master-api-key` is only ever compared against the master key.
#[derive(Debug, Clone, Default)]
pub struct PresentedKeys {
    pub api_key: Option<String>,
    pub master_key: Option<String>,
}

impl PresentedKeys {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        Self {
            api_key: read(HEADER_API_KEY),
            master_key: read(HEADER_MASTER_API_KEY),
        }
    }

    pub fn api_key(key: &str) -> Self {
        Self {
            api_key: Some(key.to_string()),
            master_key: None,
        }
    }

    pub fn master_candidates(&self) -> impl Iterator<Item = &str> {
        self.master_key.iter().chain(self.api_key.iter()).map(String::as_str)
    }
}

/// Body of `POST /create/{tenant}` and `POST /addkey/{tenant}` responses.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyIssuedResponse {
    pub message: String,
    pub api_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterRotatedResponse {
    pub message: String,
    pub master_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TenantListResponse {
    pub tenants: Vec<String>,
}
