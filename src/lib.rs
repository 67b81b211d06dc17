//! Multi-Tenant Document Store Library
//!
//! This library crate defines the modules behind the two run modes of `hive-store`:
//! the storage server and the reverse proxy in front of a pool of storage servers.
//!
//! ## Architecture Modules
//! - **`config`**: JSON configuration for the server (data dir, delegation, backend,
//!   connection key) and the proxy (routes and targets).
//! - **`error`**: The shared error taxonomy and its mapping to HTTP statuses.
//! - **`store`**: Flat-file persistence. One JSON array per tenant, written atomically and
//!   serialized per tenant.
//! - **`keys`**: The master/tenant API key hierarchy, the tenant registry and the access
//!   checks every request goes through.
//! - **`dispatch`**: Decides per tenant and operation whether the local store or an external
//!   backend answers, and serves the `/{tenant}/{operation}` endpoint.
//! - **`proxy`**: Handshake-gated, health-aware round-robin reverse proxy.
//! - **`server`**: Wires the services above into the storage server's router.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod keys;
pub mod proxy;
pub mod server;
pub mod store;
