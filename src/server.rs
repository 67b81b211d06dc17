//! Storage server assembly.
//!
//! Opens the data directory, loads the key registry and wires every service
//! into one axum `Router`. Admin paths are static segments, so they take
//! precedence over the `/:tenant/:operation` pattern.

use crate::config::ServerConfig;
use crate::dispatch::backend;
use crate::dispatch::dispatcher::Dispatcher;
use crate::dispatch::handlers::handle_operation;
use crate::dispatch::policy::DispatchPolicy;
use crate::keys::access::AccessController;
use crate::keys::handlers::{
    handle_add_key, handle_create_tenant, handle_delete_tenant, handle_list_tenants,
    handle_rotate_master,
};
use crate::keys::registry::KeyRegistry;
use crate::proxy::handshake::{HandshakeAcceptor, handle_connect};
use crate::proxy::types::ENDPOINT_CONNECT;
use crate::store::collection::TenantStore;
use crate::store::persist::DataDir;

use axum::{
    Extension, Router,
    routing::{delete, get, post},
};
use std::sync::Arc;

pub struct Services {
    pub registry: Arc<KeyRegistry>,
    pub access: Arc<AccessController>,
    pub store: Arc<TenantStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub handshake: Option<Arc<HandshakeAcceptor>>,
}

impl Services {
    pub async fn open(config: &ServerConfig) -> anyhow::Result<Self> {
        let data_dir = Arc::new(DataDir::open(&config.data_dir).await?);
        tracing::info!("Data directory: {}", data_dir.root().display());

        let store = TenantStore::new(data_dir.clone());
        let registry = KeyRegistry::load(data_dir, store.clone()).await?;
        let access = AccessController::new(registry.clone());

        let backend = config.backend.as_ref().map(backend::from_config);
        if let Some(backend) = &backend {
            tracing::info!("Delegation backend: {}", backend.name());
        }
        let dispatcher = Dispatcher::new(
            DispatchPolicy::new(&config.delegation),
            registry.clone(),
            store.clone(),
            backend,
        );

        let handshake = config.connection_key.clone().map(HandshakeAcceptor::new);

        Ok(Self {
            registry,
            access,
            store,
            dispatcher,
            handshake,
        })
    }
}

pub fn build_router(services: &Services) -> Router {
    let mut app = Router::new()
        .route("/create/:tenant", post(handle_create_tenant))
        .route("/addkey/:tenant", post(handle_add_key))
        .route("/delete/:tenant", delete(handle_delete_tenant))
        .route("/admin/rotate", post(handle_rotate_master))
        .route("/admin/tenants", get(handle_list_tenants))
        .route(
            "/:tenant/:operation",
            get(handle_operation)
                .post(handle_operation)
                .put(handle_operation)
                .delete(handle_operation),
        );

    if let Some(acceptor) = &services.handshake {
        app = app
            .route(ENDPOINT_CONNECT, post(handle_connect))
            .layer(Extension(acceptor.clone()));
    }

    app.layer(Extension(services.access.clone()))
        .layer(Extension(services.registry.clone()))
        .layer(Extension(services.dispatcher.clone()))
}
