use super::protocol::Operation;
use crate::config::DelegationConfig;

use std::collections::{BTreeSet, HashMap};

/// Where an operation is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Local,
    Delegate,
}

/// Static per-tenant delegate sets.
#[derive(Debug, Clone, Default)]
pub struct DispatchPolicy {
    default: BTreeSet<String>,
    tenants: HashMap<String, BTreeSet<String>>,
}

fn normalize(names: &[String]) -> BTreeSet<String> {
    names
        .iter()
        .map(|name| Operation::parse(name.trim()).name().to_string())
        .collect()
}

impl DispatchPolicy {
    pub fn new(config: &DelegationConfig) -> Self {
        Self {
            default: normalize(&config.default),
            tenants: config
                .tenants
                .iter()
                .map(|(tenant, names)| (tenant.clone(), normalize(names)))
                .collect(),
        }
    }

    /// A tenant with its own entry uses only that entry; others fall back to `default`.
    pub fn route(&self, tenant: &str, operation: &Operation) -> Route {
        let delegated = self.tenants.get(tenant).unwrap_or(&self.default);
        if delegated.contains(operation.name()) {
            Route::Delegate
        } else {
            Route::Local
        }
    }

    pub fn delegates_anything(&self) -> bool {
        !self.default.is_empty() || self.tenants.values().any(|names| !names.is_empty())
    }
}
