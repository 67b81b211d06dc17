//! Reverse Proxy Module
//!
//! A gateway that load-balances client requests across a pool of backend instances.
//! It runs as its own process and never consults the key registry.
//!
//! ## Core Mechanisms
//! - **Handshake**: at startup every target receives `POST /connect` with its pre-shared
//!   connection key; only targets answering 200 become selectable. Startup aborts when no
//!   target anywhere is healthy.
//! - **Selection**: the longest matching path prefix picks the route; a per-route cursor
//!   round-robins over that route's currently healthy targets.
//! - **Failure recovery**: a connection error or timeout while forwarding answers 502, marks the
//!   target unhealthy and spawns exactly one reconnect handshake. There is no periodic checker.
//!
//! ## Submodules
//! - **`types`**: Health states, wire constants and status DTOs.
//! - **`router`**: Route matching, health tracking, selection and forwarding.
//! - **`handshake`**: The target side of `/connect`, served by storage servers.
//! - **`handlers`**: Axum glue for the proxy process.

pub mod handlers;
pub mod handshake;
pub mod router;
pub mod types;
