//! Key Management Module
//!
//! Implements the two-tier API key hierarchy that gates every storage operation.
//!
//! ## Core Concepts
//! - **Master key**: one process-wide secret. It authorizes administration (tenant creation,
//!   key issuance, deletion, rotation) and overrides every tenant-level check.
//! - **Tenant keys**: each tenant owns a primary key plus any number of additional keys.
//!   Any of them unlocks that tenant's collection and nothing else.
//! - **Scopes**: `AccessController` checks a presented key against `MasterOnly` or
//!   `TenantOrMaster(name)`.

pub mod access;
pub mod handlers;
pub mod registry;
pub mod types;

#[cfg(test)]
mod tests;

use crate::error::{Error, Result};

use rand::RngCore;
use rand::rngs::OsRng;
use regex::Regex;
use std::sync::LazyLock;
use subtle::ConstantTimeEq;

/// Random bytes behind a tenant key.
pub const TENANT_KEY_BYTES: usize = 16;
/// Master keys carry twice the entropy of tenant keys.
pub const MASTER_KEY_BYTES: usize = TENANT_KEY_BYTES * 2;

/// Path segments the admin endpoints own; a tenant with one of these names
/// would be unreachable.
const RESERVED_NAMES: [&str; 4] = ["create", "addkey", "delete", "admin"];

static TENANT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("tenant name pattern"));

/// Hex-encoded key from `bytes` bytes of OS randomness.
pub fn generate_key(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

pub(crate) fn keys_match(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

pub fn validate_tenant_name(name: &str) -> Result<()> {
    if !TENANT_NAME.is_match(name) || RESERVED_NAMES.contains(&name.to_ascii_lowercase().as_str())
    {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}
