//! Operation Dispatch Module
//!
//! Decides, per tenant and operation, whether a request is served from the local
//! `TenantStore` or handed to an external backend.
//!
//! ## Flow
//! 1. **Authorization**: the handler checks the caller's key against `TenantOrMaster(tenant)`.
//! 2. **Policy**: `DispatchPolicy` looks the operation up in the tenant's delegate set.
//! 3. **Local path**: CREATE/READ/UPDATE/DELETE map onto the positional collection calls and
//!    the result is wrapped in a `{success, result}` envelope.
//! 4. **Delegated path**: the configured `Backend` receives the request and its response is
//!    returned to the client untouched.
//!
//! ## Submodules
//! - **`protocol`**: Operation names, payload shapes and the response envelope.
//! - **`policy`**: Static delegate sets.
//! - **`backend`**: The `Backend` plugin trait and its HTTP implementation.
//! - **`dispatcher`**: Glues policy, store and backend together.
//! - **`handlers`**: The `/{tenant}/{operation}` endpoint.

pub mod backend;
pub mod dispatcher;
pub mod handlers;
pub mod policy;
pub mod protocol;
