//! Key Management Tests
//!
//! Validates the master/tenant key hierarchy.
//!
//! ## Test Scopes
//! - **Key generation**: Length, encoding and uniqueness of generated keys.
//! - **KeyRegistry**: First-boot generation, reload, rotation, tenant lifecycle.
//! - **AccessController**: Scope checks for master, primary, additional and foreign keys.

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::keys::access::AccessController;
    use crate::keys::registry::KeyRegistry;
    use crate::keys::types::{Authorized, PresentedKeys, Scope, TenantRecord};
    use crate::keys::{
        MASTER_KEY_BYTES, TENANT_KEY_BYTES, generate_key, validate_tenant_name,
    };
    use crate::store::collection::TenantStore;
    use crate::store::persist::DataDir;
    use axum::http::{HeaderMap, HeaderValue};
    use std::path::Path;
    use std::sync::Arc;

    async fn open_registry(dir: &Path) -> (Arc<DataDir>, Arc<TenantStore>, Arc<KeyRegistry>) {
        let data_dir = Arc::new(DataDir::open(dir).await.unwrap());
        let store = TenantStore::new(data_dir.clone());
        let registry = KeyRegistry::load(data_dir.clone(), store.clone()).await.unwrap();
        (data_dir, store, registry)
    }

    // ============================================================
    // KEY GENERATION TESTS
    // ============================================================

    #[test]
    fn test_generated_keys_are_hex_of_expected_length() {
        let tenant_key = generate_key(TENANT_KEY_BYTES);
        let master_key = generate_key(MASTER_KEY_BYTES);

        assert_eq!(tenant_key.len(), TENANT_KEY_BYTES * 2);
        assert_eq!(master_key.len(), MASTER_KEY_BYTES * 2);
        assert!(master_key.len() >= tenant_key.len() * 2);
        assert!(tenant_key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generated_keys_are_unique() {
        let keys: std::collections::HashSet<String> =
            (0..100).map(|_| generate_key(TENANT_KEY_BYTES)).collect();
        assert_eq!(keys.len(), 100);
    }

    #[test]
    fn test_tenant_name_validation() {
        assert!(validate_tenant_name("orders").is_ok());
        assert!(validate_tenant_name("orders_2024-eu").is_ok());

        for bad in ["", "../etc", "a/b", "with space", "create", "ADMIN", "delete", "addkey"] {
            assert!(
                matches!(validate_tenant_name(bad), Err(Error::InvalidName(_))),
                "'{}' should be rejected",
                bad
            );
        }
        assert!(validate_tenant_name(&"x".repeat(65)).is_err());
    }

    // ============================================================
    // KEY REGISTRY TESTS
    // ============================================================

    #[tokio::test]
    async fn test_master_key_generated_on_first_boot_and_reloaded() {
        let tmp = tempfile::tempdir().unwrap();

        let (data_dir, _, registry) = open_registry(tmp.path()).await;
        let first = registry.master_key().await;
        assert_eq!(first.len(), MASTER_KEY_BYTES * 2);
        assert!(data_dir.master_file().exists());

        let (_, _, reloaded) = open_registry(tmp.path()).await;
        assert_eq!(reloaded.master_key().await, first);
    }

    #[tokio::test]
    async fn test_rotate_invalidates_previous_master_key() {
        let tmp = tempfile::tempdir().unwrap();
        let (_, _, registry) = open_registry(tmp.path()).await;
        let old = registry.master_key().await;

        let new = registry.rotate().await.unwrap();

        assert_ne!(old, new);
        assert!(!registry.is_master_key(&old).await);
        assert!(registry.is_master_key(&new).await);

        // Rotation is persisted
        let (_, _, reloaded) = open_registry(tmp.path()).await;
        assert_eq!(reloaded.master_key().await, new);
    }

    #[tokio::test]
    async fn test_create_tenant_twice_is_already_exists() {
        let tmp = tempfile::tempdir().unwrap();
        let (_, _, registry) = open_registry(tmp.path()).await;

        let key = registry.create_tenant("orders").await.unwrap();
        assert_eq!(key.len(), TENANT_KEY_BYTES * 2);

        let second = registry.create_tenant("orders").await;
        assert!(matches!(second, Err(Error::AlreadyExists(name)) if name == "orders"));

        // The first key is untouched
        assert_eq!(registry.get_tenant("orders").unwrap().primary_key, key);
    }

    #[tokio::test]
    async fn test_concurrent_creates_yield_exactly_one_winner() {
        let tmp = tempfile::tempdir().unwrap();
        let (_, _, registry) = open_registry(tmp.path()).await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move { registry.create_tenant("race").await }));
        }

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(Error::AlreadyExists(_)) => {}
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn test_create_tenant_persists_record_and_empty_collection() {
        let tmp = tempfile::tempdir().unwrap();
        let (data_dir, store, registry) = open_registry(tmp.path()).await;

        registry.create_tenant("orders").await.unwrap();

        assert!(data_dir.metadata_file("orders").exists());
        assert!(store.list("orders").await.unwrap().is_empty());

        let (_, _, reloaded) = open_registry(tmp.path()).await;
        let record: TenantRecord = reloaded.get_tenant("orders").unwrap();
        assert_eq!(record.name, "orders");
        assert!(record.additional_keys.is_empty());
    }

    #[tokio::test]
    async fn test_add_tenant_key_appends_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let (_, _, registry) = open_registry(tmp.path()).await;
        registry.create_tenant("orders").await.unwrap();

        let k2 = registry.add_tenant_key("orders").await.unwrap();
        let k3 = registry.add_tenant_key("orders").await.unwrap();

        let record = registry.get_tenant("orders").unwrap();
        assert_eq!(record.additional_keys, vec![k2.clone(), k3.clone()]);
        assert!(record.holds_key(&k2));
        assert!(record.holds_key(&k3));
    }

    #[tokio::test]
    async fn test_add_key_to_unknown_tenant_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let (_, _, registry) = open_registry(tmp.path()).await;

        let result = registry.add_tenant_key("ghost").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_tenant_removes_record_and_collection() {
        let tmp = tempfile::tempdir().unwrap();
        let (data_dir, _, registry) = open_registry(tmp.path()).await;
        registry.create_tenant("orders").await.unwrap();

        registry.delete_tenant("orders").await.unwrap();

        assert!(registry.get_tenant("orders").is_none());
        assert!(!data_dir.metadata_file("orders").exists());
        assert!(!data_dir.collection_file("orders").exists());

        let again = registry.delete_tenant("orders").await;
        assert!(matches!(again, Err(Error::NotFound(_))));

        // The name is free again
        assert!(registry.create_tenant("orders").await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_collection_delete_keeps_tenant() {
        let tmp = tempfile::tempdir().unwrap();
        let (data_dir, _, registry) = open_registry(tmp.path()).await;
        let key = registry.create_tenant("orders").await.unwrap();

        // A directory in place of the collection file cannot be unlinked.
        let collection = data_dir.collection_file("orders");
        std::fs::remove_file(&collection).unwrap();
        std::fs::create_dir(&collection).unwrap();

        let result = registry.delete_tenant("orders").await;
        assert!(matches!(result, Err(Error::InternalStorage(_))));

        assert_eq!(registry.list_tenants(), vec!["orders"]);
        assert!(data_dir.metadata_file("orders").exists());

        let access = AccessController::new(registry.clone());
        let authorized = access
            .authorize(
                &PresentedKeys::api_key(&key),
                &Scope::TenantOrMaster("orders".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(authorized, Authorized::Tenant("orders".to_string()));
    }

    #[tokio::test]
    async fn test_list_tenants_is_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        let (_, _, registry) = open_registry(tmp.path()).await;
        for name in ["users", "orders", "carts"] {
            registry.create_tenant(name).await.unwrap();
        }

        assert_eq!(registry.list_tenants(), vec!["carts", "orders", "users"]);
    }

    // ============================================================
    // ACCESS CONTROLLER TESTS
    // ============================================================

    #[tokio::test]
    async fn test_master_only_accepts_only_master_key() {
        let tmp = tempfile::tempdir().unwrap();
        let (_, _, registry) = open_registry(tmp.path()).await;
        let tenant_key = registry.create_tenant("orders").await.unwrap();
        let access = AccessController::new(registry.clone());

        let master = PresentedKeys::api_key(&registry.master_key().await);
        assert_eq!(
            access.authorize(&master, &Scope::MasterOnly).await.unwrap(),
            Authorized::Master
        );

        let tenant = PresentedKeys::api_key(&tenant_key);
        assert!(matches!(
            access.authorize(&tenant, &Scope::MasterOnly).await,
            Err(Error::Forbidden)
        ));

        assert!(matches!(
            access.authorize(&PresentedKeys::default(), &Scope::MasterOnly).await,
            Err(Error::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_tenant_scope_accepts_primary_additional_and_master() {
        let tmp = tempfile::tempdir().unwrap();
        let (_, _, registry) = open_registry(tmp.path()).await;
        let primary = registry.create_tenant("orders").await.unwrap();
        let additional = registry.add_tenant_key("orders").await.unwrap();
        let access = AccessController::new(registry.clone());
        let scope = Scope::TenantOrMaster("orders".to_string());

        for key in [primary, additional] {
            assert_eq!(
                access.authorize(&PresentedKeys::api_key(&key), &scope).await.unwrap(),
                Authorized::Tenant("orders".to_string())
            );
        }

        let master = PresentedKeys::api_key(&registry.master_key().await);
        assert_eq!(access.authorize(&master, &scope).await.unwrap(), Authorized::Master);
    }

    #[tokio::test]
    async fn test_foreign_tenant_key_is_forbidden() {
        let tmp = tempfile::tempdir().unwrap();
        let (_, _, registry) = open_registry(tmp.path()).await;
        registry.create_tenant("orders").await.unwrap();
        let other_key = registry.create_tenant("users").await.unwrap();
        let access = AccessController::new(registry);

        let result = access
            .authorize(
                &PresentedKeys::api_key(&other_key),
                &Scope::TenantOrMaster("orders".to_string()),
            )
            .await;
        assert!(matches!(result, Err(Error::Forbidden)));
    }

    #[tokio::test]
    async fn test_unknown_tenant_is_not_found_not_forbidden() {
        let tmp = tempfile::tempdir().unwrap();
        let (_, _, registry) = open_registry(tmp.path()).await;
        let access = AccessController::new(registry);

        let result = access
            .authorize(
                &PresentedKeys::api_key("whatever"),
                &Scope::TenantOrMaster("ghost".to_string()),
            )
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_master_header_is_accepted() {
        let tmp = tempfile::tempdir().unwrap();
        let (_, _, registry) = open_registry(tmp.path()).await;
        let access = AccessController::new(registry.clone());

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-master-api-key",
            HeaderValue::from_str(&registry.master_key().await).unwrap(),
        );
        headers.insert("x-api-key", HeaderValue::from_static("not-a-key"));

        let keys = PresentedKeys::from_headers(&headers);
        assert_eq!(
            access.authorize(&keys, &Scope::MasterOnly).await.unwrap(),
            Authorized::Master
        );
    }

    #[tokio::test]
    async fn test_rotated_master_key_loses_tenant_override() {
        let tmp = tempfile::tempdir().unwrap();
        let (_, _, registry) = open_registry(tmp.path()).await;
        registry.create_tenant("orders").await.unwrap();
        let access = AccessController::new(registry.clone());
        let old = registry.master_key().await;

        registry.rotate().await.unwrap();

        let result = access
            .authorize(
                &PresentedKeys::api_key(&old),
                &Scope::TenantOrMaster("orders".to_string()),
            )
            .await;
        assert!(matches!(result, Err(Error::Forbidden)));
    }
}
